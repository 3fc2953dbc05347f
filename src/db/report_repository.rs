use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::db::{DataQuality, DbError, LocationCount, StockBucket, Uniqueness};

/// Read-only inventory health queries
#[derive(Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn count_books(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM libros")
            .fetch_one(&self.pool)
            .await?;

        debug!("libros holds {} rows", count);
        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn stock_distribution(&self) -> Result<Vec<StockBucket>, DbError> {
        let buckets = sqlx::query_as::<_, StockBucket>(
            r#"
            SELECT
                CASE
                    WHEN stock = 0 THEN 'Sin Stock'
                    WHEN stock BETWEEN 1 AND 5 THEN '1-5 unidades'
                    WHEN stock BETWEEN 6 AND 20 THEN '6-20 unidades'
                    ELSE 'Más de 20'
                END AS bucket,
                COUNT(*) AS total
            FROM libros
            GROUP BY bucket
            ORDER BY bucket
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(buckets)
    }

    /// Row count per `ubicacion`, with missing values reported as `NULL`
    #[instrument(skip(self))]
    pub async fn location_distribution(&self) -> Result<Vec<LocationCount>, DbError> {
        Self::location_distribution_with(&self.pool).await
    }

    pub async fn location_distribution_with<'e, E>(executor: E) -> Result<Vec<LocationCount>, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let counts = sqlx::query_as::<_, LocationCount>(
            r#"
            SELECT COALESCE(ubicacion, 'NULL') AS location, COUNT(*) AS total
            FROM libros
            GROUP BY ubicacion
            ORDER BY location
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(counts)
    }

    #[instrument(skip(self))]
    pub async fn data_quality(&self) -> Result<DataQuality, DbError> {
        let quality = sqlx::query_as::<_, DataQuality>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE titulo IS NULL OR titulo = '') AS missing_title,
                COUNT(*) FILTER (WHERE autor IS NULL OR autor = '') AS missing_author,
                COUNT(*) FILTER (WHERE precio IS NULL OR precio <= 0) AS missing_price,
                COUNT(*) FILTER (WHERE ubicacion IS NULL OR ubicacion = '') AS missing_location
            FROM libros
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(quality)
    }

    #[instrument(skip(self))]
    pub async fn uniqueness(&self) -> Result<Uniqueness, DbError> {
        let uniqueness = sqlx::query_as::<_, Uniqueness>(
            r#"
            SELECT COUNT(DISTINCT legacy_id) AS unique_ids,
                   COUNT(*) AS total_records
            FROM libros
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(uniqueness)
    }
}
