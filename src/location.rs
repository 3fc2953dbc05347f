//! Storage locations and their legacy code conventions.
//!
//! Every location owns a numbering pool. Codes in the pool share a suffix
//! (empty for the warehouse) and some pools carry an outlier ceiling: values
//! at or above it are historical data-entry errors that must not drive the
//! next allocation.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Location {
    Almacen,
    Galeon,
    Hortaleza,
    Reina,
    General,
    Abebooks,
    UniLiber,
}

impl Location {
    /// Canonical label as stored in `libros.ubicacion` and `ubicaciones.nombre`
    pub fn label(&self) -> &'static str {
        match self {
            Location::Almacen => "Almacén",
            Location::Galeon => "Galeón",
            Location::Hortaleza => "Hortaleza",
            Location::Reina => "Reina",
            Location::General => "General",
            Location::Abebooks => "Abebooks",
            Location::UniLiber => "UniLiber",
        }
    }

    pub fn config(&self) -> &'static LocationConfig {
        &LOCATION_TABLE[*self as usize]
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationConfig {
    pub location: Location,
    pub suffix: &'static str,
    pub outlier_ceiling: Option<u64>,
}

impl LocationConfig {
    pub fn label(&self) -> &'static str {
        self.location.label()
    }

    /// Whether a numeric part is below the outlier ceiling (always true without one)
    pub fn accepts(&self, number: u64) -> bool {
        self.outlier_ceiling.map_or(true, |ceiling| number < ceiling)
    }
}

// Indexed by `Location` discriminant.
pub static LOCATION_TABLE: [LocationConfig; 7] = [
    LocationConfig {
        location: Location::Almacen,
        suffix: "",
        outlier_ceiling: Some(3_000_000),
    },
    LocationConfig {
        location: Location::Galeon,
        suffix: "G",
        outlier_ceiling: Some(50_000),
    },
    LocationConfig {
        location: Location::Hortaleza,
        suffix: "H",
        outlier_ceiling: Some(50_000),
    },
    LocationConfig {
        location: Location::Reina,
        suffix: "R",
        outlier_ceiling: None,
    },
    LocationConfig {
        location: Location::General,
        suffix: "AG",
        outlier_ceiling: None,
    },
    LocationConfig {
        location: Location::Abebooks,
        suffix: "Ab",
        outlier_ceiling: None,
    },
    LocationConfig {
        location: Location::UniLiber,
        suffix: "UL",
        outlier_ceiling: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown location: {label}")]
pub struct UnknownLocationError {
    pub label: String,
}

/// Read-only lookup over a set of location configurations
#[derive(Debug, Clone, Copy)]
pub struct LocationTable {
    entries: &'static [LocationConfig],
}

impl Default for LocationTable {
    fn default() -> Self {
        Self::new(&LOCATION_TABLE)
    }
}

impl LocationTable {
    pub fn new(entries: &'static [LocationConfig]) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &'static [LocationConfig] {
        self.entries
    }

    /// Resolve a label ignoring case, accents and surrounding whitespace
    pub fn lookup(&self, label: &str) -> Result<&'static LocationConfig, UnknownLocationError> {
        let wanted = fold_label(label);
        self.entries
            .iter()
            .find(|c| fold_label(c.label()) == wanted)
            .ok_or_else(|| UnknownLocationError {
                label: label.to_string(),
            })
    }
}

/// Characters folded by [`fold_label`], for `translate()` on the SQL side
pub const FOLD_FROM: &str = "áàäâéèëêíìïîóòöôúùüûñ";
pub const FOLD_TO: &str = "aaaaeeeeiiiioooouuuun";

/// Lowercase and strip Spanish diacritics so `Galeon`, `galeón` and `GALEÓN` compare equal
pub fn fold_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Canonical label for a raw `ubicacion` value, or `None` when it should be left alone.
///
/// Placeholders left behind by the bulk imports (`NULL`, empty, `-1`, `0`,
/// `XXX...`) are folded into the generic `General` pool.
pub fn normalize_raw_label(raw: Option<&str>) -> Option<&'static str> {
    let Some(raw) = raw else {
        return Some(Location::General.label());
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-1" || trimmed == "0" || trimmed.starts_with("XXX") {
        return Some(Location::General.label());
    }
    LocationTable::default()
        .lookup(trimmed)
        .ok()
        .map(|c| c.label())
}
