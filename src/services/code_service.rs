use std::future::Future;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::db::{BookRepository, DbError};
use crate::legacy_code::{candidate_number, next_code_for, AllocatorError, LegacyCodeAllocator};
use crate::location::LocationConfig;

/// Candidate rows fetched per allocation. The store returns them highest
/// number first, so only the head matters.
pub const DEFAULT_CANDIDATE_LIMIT: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum CodeServiceError {
    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<sqlx::Error> for CodeServiceError {
    fn from(e: sqlx::Error) -> Self {
        CodeServiceError::Database(DbError::from(e))
    }
}

/// Where existing legacy codes for a location come from.
///
/// Implementations should return codes for `config`'s location only. Order is
/// not significant and extra rows are filtered by the allocator.
pub trait LegacyIdSource {
    fn fetch_legacy_ids(
        &self,
        config: &LocationConfig,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<String>, DbError>> + Send;
}

impl LegacyIdSource for BookRepository {
    fn fetch_legacy_ids(
        &self,
        config: &LocationConfig,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<String>, DbError>> + Send {
        BookRepository::fetch_legacy_ids(self, config, limit)
    }
}

/// Current state of a location's numbering pool
#[derive(Debug, Clone, Serialize)]
pub struct NextCodePreview {
    pub location: &'static str,
    pub suffix: &'static str,
    pub outlier_ceiling: Option<u64>,
    pub current_max: Option<String>,
    pub next_code: String,
    pub top_codes: Vec<String>,
}

#[derive(Clone)]
pub struct CodeService<S> {
    source: S,
    allocator: LegacyCodeAllocator,
    top_codes: usize,
}

impl<S: LegacyIdSource> CodeService<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            allocator: LegacyCodeAllocator::default(),
            top_codes: DEFAULT_CANDIDATE_LIMIT as usize,
        }
    }

    /// How many existing codes a preview lists. Display only; the next code
    /// is always computed from a full candidate fetch.
    pub fn with_top_codes(mut self, count: usize) -> Self {
        self.top_codes = count;
        self
    }

    fn fetch_limit(&self) -> i64 {
        i64::try_from(self.top_codes)
            .unwrap_or(i64::MAX)
            .max(DEFAULT_CANDIDATE_LIMIT)
    }

    pub fn allocator(&self) -> &LegacyCodeAllocator {
        &self.allocator
    }

    /// Next legacy code for `location`, without persisting anything
    #[instrument(skip(self))]
    pub async fn next_code(&self, location: &str) -> Result<String, CodeServiceError> {
        Ok(self.preview(location).await?.next_code)
    }

    /// Next code plus the candidates it was derived from
    #[instrument(skip(self))]
    pub async fn preview(&self, location: &str) -> Result<NextCodePreview, CodeServiceError> {
        // Unknown labels fail before touching the store
        let config = self.allocator.config_for(location)?;
        let ids = self
            .source
            .fetch_legacy_ids(config, self.fetch_limit())
            .await?;
        debug!("Fetched {} candidates for {}", ids.len(), config.label());

        let mut top_codes: Vec<String> = ids
            .into_iter()
            .filter(|id| candidate_number(id, config).is_some())
            .collect();
        top_codes.sort_by_key(|id| std::cmp::Reverse(candidate_number(id, config)));

        let next_code = next_code_for(config, &top_codes)?;
        let current_max = top_codes.first().cloned();
        top_codes.truncate(self.top_codes);
        info!("Next code for {} is {}", config.label(), next_code);

        Ok(NextCodePreview {
            location: config.label(),
            suffix: config.suffix,
            outlier_ceiling: config.outlier_ceiling,
            current_max,
            next_code,
            top_codes,
        })
    }

    /// Previews for every configured location, in table order
    pub async fn preview_all(&self) -> Result<Vec<NextCodePreview>, CodeServiceError> {
        let mut previews = Vec::new();
        for config in self.allocator.table().entries() {
            previews.push(self.preview(config.label()).await?);
        }
        Ok(previews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory stand-in for the `libros` table, keyed by location label
    #[derive(Default, Clone)]
    struct FakeSource {
        codes: HashMap<&'static str, Vec<&'static str>>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeSource {
        fn with(location: &'static str, codes: &[&'static str]) -> Self {
            let mut source = Self::default();
            source.codes.insert(location, codes.to_vec());
            source
        }
    }

    impl LegacyIdSource for FakeSource {
        fn fetch_legacy_ids(
            &self,
            config: &LocationConfig,
            _limit: i64,
        ) -> impl Future<Output = Result<Vec<String>, DbError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ids: Vec<String> = self
                .codes
                .get(config.label())
                .map(|codes| codes.iter().map(|c| c.to_string()).collect())
                .unwrap_or_default();
            async move { Ok(ids) }
        }
    }

    #[tokio::test]
    async fn test_next_code_from_source() {
        let source = FakeSource::with("Galeón", &["00000005G", "00000012G", "junk"]);
        let service = CodeService::new(source);

        let code = service.next_code("Galeon").await.unwrap();
        assert_eq!(code, "00000013G");
    }

    #[tokio::test]
    async fn test_empty_location_starts_at_one() {
        let service = CodeService::new(FakeSource::default());
        assert_eq!(service.next_code("Reina").await.unwrap(), "00000001R");
        assert_eq!(service.next_code("Almacén").await.unwrap(), "00000001");
    }

    #[tokio::test]
    async fn test_preview_orders_candidates_numerically() {
        let source = FakeSource::with(
            "Almacén",
            &["00229999", "05000000", "00230000", "0022999G", "ABC"],
        );
        let preview = CodeService::new(source).preview("almacen").await.unwrap();

        assert_eq!(preview.location, "Almacén");
        assert_eq!(preview.suffix, "");
        assert_eq!(preview.outlier_ceiling, Some(3_000_000));
        assert_eq!(preview.current_max.as_deref(), Some("00230000"));
        assert_eq!(preview.top_codes, vec!["00230000", "00229999"]);
        assert_eq!(preview.next_code, "00230001");
    }

    #[tokio::test]
    async fn test_unknown_location_skips_the_source() {
        let source = FakeSource::default();
        let calls = source.calls.clone();
        let service = CodeService::new(source);

        let err = service.next_code("Madrid").await.unwrap_err();
        assert!(matches!(
            err,
            CodeServiceError::Allocator(AllocatorError::UnknownLocation(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preview_all_covers_every_location() {
        let source = FakeSource::with("Hortaleza", &["00000099H"]);
        let previews = CodeService::new(source).preview_all().await.unwrap();

        assert_eq!(previews.len(), 7);
        let hortaleza = previews.iter().find(|p| p.location == "Hortaleza").unwrap();
        assert_eq!(hortaleza.next_code, "00000100H");
        let general = previews.iter().find(|p| p.location == "General").unwrap();
        assert_eq!(general.next_code, "00000001AG");
        assert!(general.current_max.is_none());
    }

    /// Filters, orders and truncates like the Postgres query
    struct LimitedSource(Vec<&'static str>);

    impl LegacyIdSource for LimitedSource {
        fn fetch_legacy_ids(
            &self,
            config: &LocationConfig,
            limit: i64,
        ) -> impl Future<Output = Result<Vec<String>, DbError>> + Send {
            let mut ids: Vec<&str> = self
                .0
                .iter()
                .copied()
                .filter(|id| candidate_number(id, config).is_some())
                .collect();
            ids.sort_by_key(|id| std::cmp::Reverse(candidate_number(id, config)));
            let ids: Vec<String> = ids
                .into_iter()
                .take(usize::try_from(limit).unwrap_or(0))
                .map(str::to_string)
                .collect();
            async move { Ok(ids) }
        }
    }

    #[tokio::test]
    async fn test_top_codes_count_does_not_change_next_code() {
        let source = LimitedSource(vec!["00000500G", "00000499G"]);
        let preview = CodeService::new(source)
            .with_top_codes(0)
            .preview("Galeón")
            .await
            .unwrap();

        assert_eq!(preview.next_code, "00000501G");
        assert_eq!(preview.current_max.as_deref(), Some("00000500G"));
        assert!(preview.top_codes.is_empty());
    }

    #[tokio::test]
    async fn test_top_codes_are_truncated_for_display() {
        let source = LimitedSource(vec!["00000003R", "00000010R", "00000007R"]);
        let preview = CodeService::new(source)
            .with_top_codes(2)
            .preview("Reina")
            .await
            .unwrap();

        assert_eq!(preview.top_codes, vec!["00000010R", "00000007R"]);
        assert_eq!(preview.next_code, "00000011R");
    }
}
