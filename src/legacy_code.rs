//! Legacy item codes: `NNNNNNNN[suffix]`.
//!
//! The numeric part is zero-padded to [`CODE_WIDTH`] digits and the suffix
//! identifies the location pool the code was allocated from. Allocation is a
//! pure function of the location's conventions and the codes already in use;
//! fetching candidates and persisting the result belong to the caller.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::location::{Location, LocationConfig, LocationTable, UnknownLocationError};

/// Minimum width of the numeric part
pub const CODE_WIDTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AllocatorError {
    #[error(transparent)]
    UnknownLocation(#[from] UnknownLocationError),

    /// The next number would reach the ceiling, where it would be ignored and issued twice
    #[error("No legacy codes left for {location} below {limit}")]
    Exhausted { location: &'static str, limit: u64 },
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([0-9]+)([A-Za-z]*)$").expect("legacy code pattern is valid"))
}

fn digits_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("digits pattern is valid"))
}

/// A code split into its numeric part and suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyCode<'a> {
    pub number: u64,
    pub suffix: &'a str,
}

impl<'a> LegacyCode<'a> {
    /// Split `digits + letters` after trimming spaces, as `btrim` does on the
    /// store side. Anything else, or a numeric part that does not fit in a
    /// `u64`, yields `None`.
    pub fn parse(code: &'a str) -> Option<Self> {
        let captures = code_pattern().captures(code.trim_matches(' '))?;
        let number = captures.get(1)?.as_str().parse().ok()?;
        let suffix = captures.get(2)?.as_str();
        Some(Self { number, suffix })
    }
}

impl fmt::Display for LegacyCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}{}", self.number, self.suffix, width = CODE_WIDTH)
    }
}

pub fn format_code(number: u64, suffix: &str) -> String {
    LegacyCode { number, suffix }.to_string()
}

/// Numeric part of `code` if it belongs to `config`'s pool and is below its outlier ceiling
pub fn candidate_number(code: &str, config: &LocationConfig) -> Option<u64> {
    let parsed = LegacyCode::parse(code)?;
    (parsed.suffix == config.suffix && config.accepts(parsed.number)).then_some(parsed.number)
}

/// Next free code in `config`'s pool given the codes already recorded there.
///
/// Malformed codes, codes from other pools and outliers are ignored. With no
/// usable candidate the pool starts at 1. Fails when the next number would hit
/// the outlier ceiling, since a code there would be ignored on the following
/// allocation and handed out again.
pub fn next_code_for<I, S>(config: &LocationConfig, existing: I) -> Result<String, AllocatorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let current_max = existing
        .into_iter()
        .filter_map(|code| candidate_number(code.as_ref(), config))
        .max();

    let next = match current_max {
        None => 1,
        Some(max) => max.checked_add(1).ok_or(AllocatorError::Exhausted {
            location: config.label(),
            limit: u64::MAX,
        })?,
    };

    if !config.accepts(next) {
        return Err(AllocatorError::Exhausted {
            location: config.label(),
            limit: config.outlier_ceiling.unwrap_or(u64::MAX),
        });
    }

    Ok(format_code(next, config.suffix))
}

/// Allocator bound to a location table
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyCodeAllocator {
    table: LocationTable,
}

impl LegacyCodeAllocator {
    pub fn new(table: LocationTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &LocationTable {
        &self.table
    }

    pub fn config_for(&self, location: &str) -> Result<&'static LocationConfig, AllocatorError> {
        Ok(self.table.lookup(location)?)
    }

    pub fn next_code<I, S>(&self, location: &str, existing: I) -> Result<String, AllocatorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config = self.config_for(location)?;
        next_code_for(config, existing)
    }
}

/// Deduce the pool a code was allocated from by its suffix.
///
/// Suffixes are matched exactly, so `00000001AG` is General and not Galeón.
pub fn location_for_code(code: &str) -> Option<Location> {
    let parsed = LegacyCode::parse(code)?;
    LocationTable::default()
        .entries()
        .iter()
        .find(|c| c.suffix == parsed.suffix)
        .map(|c| c.location)
}

/// First run of digits in `code`, tolerating prefixes like `A-00001`
pub fn base_number(code: &str) -> Option<u64> {
    digits_pattern().find(code)?.as_str().parse().ok()
}

/// Rebuild `code` for another pool, keeping its number
pub fn recode_for_location(code: &str, config: &LocationConfig) -> Option<String> {
    base_number(code).map(|number| format_code(number, config.suffix))
}

pub fn is_valid_for_location(code: &str, config: &LocationConfig) -> bool {
    LegacyCode::parse(code).is_some_and(|parsed| parsed.suffix == config.suffix)
}

/// `code` as it should read in `config`'s pool: kept when it already follows
/// the pool's convention, otherwise rebuilt with the pool's suffix
pub fn code_for_location(code: &str, config: &LocationConfig) -> Option<String> {
    if is_valid_for_location(code, config) {
        Some(code.trim_matches(' ').to_string())
    } else {
        recode_for_location(code, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator() -> LegacyCodeAllocator {
        LegacyCodeAllocator::default()
    }

    #[test]
    fn test_empty_pool_starts_at_one() {
        for config in LocationTable::default().entries() {
            let code = allocator()
                .next_code(config.label(), Vec::<String>::new())
                .unwrap();
            assert_eq!(code, format!("00000001{}", config.suffix));
        }
    }

    #[test]
    fn test_increments_the_maximum() {
        for config in LocationTable::default().entries() {
            let existing = vec![
                format!("00000005{}", config.suffix),
                format!("00000012{}", config.suffix),
            ];
            let code = allocator().next_code(config.label(), &existing).unwrap();
            assert_eq!(code, format!("00000013{}", config.suffix));
        }
    }

    #[test]
    fn test_outlier_ceiling_excludes_known_errors() {
        let code = allocator()
            .next_code("Almacén", ["00229999", "00230000", "05000000"])
            .unwrap();
        assert_eq!(code, "00230001");
    }

    #[test]
    fn test_malformed_codes_are_ignored() {
        for config in LocationTable::default().entries() {
            let existing = vec!["ABC".to_string(), format!("00000007{}", config.suffix)];
            let code = allocator().next_code(config.label(), &existing).unwrap();
            assert_eq!(code, format!("00000008{}", config.suffix));
        }
    }

    #[test]
    fn test_output_feeds_back_as_next_candidate() {
        let first = allocator().next_code("Galeón", ["00000041G"]).unwrap();
        assert_eq!(first, "00000042G");
        let second = allocator().next_code("Galeón", [first.as_str()]).unwrap();
        assert_eq!(second, "00000043G");
    }

    #[test]
    fn test_unknown_location() {
        let err = allocator().next_code("Madrid", ["00000001"]).unwrap_err();
        match err {
            AllocatorError::UnknownLocation(e) => assert_eq!(e.label, "Madrid"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_numeric_comparison_not_lexicographic() {
        // "9" sorts after "00000010" as text
        let code = allocator().next_code("Reina", ["9R", "00000010R"]).unwrap();
        assert_eq!(code, "00000011R");
    }

    #[test]
    fn test_other_pools_are_ignored() {
        // AG ends in G but belongs to General
        let code = allocator()
            .next_code("Galeón", ["00000900AG", "00000003G", "00000700H", "00000800"])
            .unwrap();
        assert_eq!(code, "00000004G");

        let code = allocator().next_code("General", ["00000900G", "00000003AG"]).unwrap();
        assert_eq!(code, "00000004AG");
    }

    #[test]
    fn test_suffix_is_case_sensitive() {
        let code = allocator().next_code("Abebooks", ["00000050AB", "00000002Ab"]).unwrap();
        assert_eq!(code, "00000003Ab");
    }

    #[test]
    fn test_wide_numbers_keep_their_width() {
        let code = allocator().next_code("Reina", ["123456789R"]).unwrap();
        assert_eq!(code, "123456790R");
    }

    #[test]
    fn test_overflowing_numbers_are_ignored() {
        let code = allocator()
            .next_code("Reina", ["99999999999999999999999R", "00000004R"])
            .unwrap();
        assert_eq!(code, "00000005R");
    }

    #[test]
    fn test_exhausted_below_ceiling() {
        let err = allocator().next_code("Galeón", ["00049999G"]).unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Exhausted {
                location: "Galeón",
                limit: 50_000
            }
        ));
    }

    #[test]
    fn test_exhausted_at_integer_limit() {
        let max = format!("{}R", u64::MAX);
        let err = allocator().next_code("Reina", [max]).unwrap_err();
        assert!(matches!(err, AllocatorError::Exhausted { .. }));
    }

    #[test]
    fn test_surrounding_whitespace_is_tolerated() {
        let code = allocator().next_code("Hortaleza", [" 00000020H "]).unwrap();
        assert_eq!(code, "00000021H");
    }

    #[test]
    fn test_only_ascii_digits_and_spaces() {
        // Arabic-Indic digits and tabs are not codes
        assert_eq!(LegacyCode::parse("\u{0661}\u{0662}R"), None);
        assert_eq!(LegacyCode::parse("\t00000020H"), None);
        assert_eq!(base_number("\u{0661}\u{0662}"), None);

        let code = allocator()
            .next_code("Hortaleza", ["00000090H\t", "00000020H"])
            .unwrap();
        assert_eq!(code, "00000021H");
    }

    #[test]
    fn test_location_for_code() {
        assert_eq!(location_for_code("00001234"), Some(Location::Almacen));
        assert_eq!(location_for_code("00001234G"), Some(Location::Galeon));
        assert_eq!(location_for_code("00001234H"), Some(Location::Hortaleza));
        assert_eq!(location_for_code("00001234R"), Some(Location::Reina));
        assert_eq!(location_for_code("00001234AG"), Some(Location::General));
        assert_eq!(location_for_code("00001234Ab"), Some(Location::Abebooks));
        assert_eq!(location_for_code("00001234UL"), Some(Location::UniLiber));
        assert_eq!(location_for_code("00001234X"), None);
        assert_eq!(location_for_code("A-00001"), None);
    }

    #[test]
    fn test_base_number() {
        assert_eq!(base_number("00001234G"), Some(1234));
        assert_eq!(base_number("A-00001"), Some(1));
        assert_eq!(base_number("sin codigo"), None);
    }

    #[test]
    fn test_recode_for_location() {
        let reina = Location::Reina.config();
        assert_eq!(recode_for_location("00001234G", reina).as_deref(), Some("00001234R"));
        let almacen = Location::Almacen.config();
        assert_eq!(recode_for_location("1234Ab", almacen).as_deref(), Some("00001234"));
        assert_eq!(recode_for_location("ABC", almacen), None);
    }

    #[test]
    fn test_code_for_location() {
        let galeon = Location::Galeon.config();
        assert_eq!(code_for_location(" 00000012G", galeon).as_deref(), Some("00000012G"));
        assert_eq!(code_for_location("00000012R", galeon).as_deref(), Some("00000012G"));
        assert_eq!(code_for_location("12", galeon).as_deref(), Some("00000012G"));
        assert_eq!(code_for_location("sin codigo", galeon), None);
    }

    #[test]
    fn test_is_valid_for_location() {
        let almacen = Location::Almacen.config();
        let galeon = Location::Galeon.config();
        assert!(is_valid_for_location("00001234", almacen));
        assert!(!is_valid_for_location("00001234G", almacen));
        assert!(is_valid_for_location("00001234G", galeon));
        assert!(!is_valid_for_location("00001234AG", galeon));
    }
}
