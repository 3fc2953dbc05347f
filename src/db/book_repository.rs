use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument};

use crate::db::{Book, CodeSample, DbError, DuplicateCode, NewBook, NormalizationStep};
use crate::location::{fold_label, Location, LocationConfig, FOLD_FROM, FOLD_TO, LOCATION_TABLE};

#[derive(Clone)]
pub struct BookRepository {
    pool: PgPool,
}

impl BookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DbError> {
        Ok(self.pool.begin().await?)
    }

    /// Legacy codes for `config`'s location shaped like its pool, highest number first.
    ///
    /// The outlier ceiling and the `u64` range are applied here too, so the
    /// rows returned are exactly the ones the allocator accepts and `limit`
    /// rows are enough to find the maximum.
    #[instrument(skip(self, config), fields(location = %config.label()))]
    pub async fn fetch_legacy_ids(
        &self,
        config: &LocationConfig,
        limit: i64,
    ) -> Result<Vec<String>, DbError> {
        Self::fetch_legacy_ids_with(&self.pool, config, limit).await
    }

    pub async fn fetch_legacy_ids_with<'e, E>(
        executor: E,
        config: &LocationConfig,
        limit: i64,
    ) -> Result<Vec<String>, DbError>
    where
        E: PgExecutor<'e>,
    {
        let pattern = format!("^[0-9]+{}$", regex::escape(config.suffix));
        let ceiling = config.outlier_ceiling.and_then(|c| i64::try_from(c).ok());
        debug!(
            "Fetching up to {} codes matching {} below {:?}",
            limit, pattern, ceiling
        );

        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT legacy_id
            FROM libros
            WHERE ubicacion = $1
              AND btrim(legacy_id) ~ $2
              -- u64::MAX
              AND CAST(substring(btrim(legacy_id) FROM '^[0-9]+') AS NUMERIC) <= 18446744073709551615
              AND ($3::BIGINT IS NULL
                   OR CAST(substring(btrim(legacy_id) FROM '^[0-9]+') AS NUMERIC) < $3)
            ORDER BY CAST(substring(btrim(legacy_id) FROM '^[0-9]+') AS NUMERIC) DESC
            LIMIT $4
            "#,
        )
        .bind(config.label())
        .bind(&pattern)
        .bind(ceiling)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        debug!("Found {} candidate codes", ids.len());
        Ok(ids)
    }

    /// Serialise allocations for one location until the transaction ends
    pub async fn lock_location(conn: &mut PgConnection, location: &str) -> Result<(), DbError> {
        debug!("Taking allocation lock for {}", location);
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(location)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn insert_with_code(
        conn: &mut PgConnection,
        legacy_id: &str,
        location: &str,
        book: &NewBook,
    ) -> Result<Book, DbError> {
        let inserted = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO libros (legacy_id, titulo, autor, ubicacion, stock, precio)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, legacy_id, titulo AS title, autor AS author, ubicacion AS location,
                      stock, precio AS price, created_at
            "#,
        )
        .bind(legacy_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(location)
        .bind(book.stock)
        .bind(book.price)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            error!(
                legacy_id = %legacy_id,
                location = %location,
                error = %e,
                "Failed to insert book"
            );
            e
        })?;

        info!("Catalogued book {} at {}", inserted.legacy_id, location);
        Ok(inserted)
    }

    /// First row carrying `legacy_id`, locked until the transaction ends
    pub async fn find_for_update(
        conn: &mut PgConnection,
        legacy_id: &str,
    ) -> Result<Option<Book>, DbError> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, legacy_id, titulo AS title, autor AS author, ubicacion AS location,
                   stock, precio AS price, created_at
            FROM libros
            WHERE btrim(legacy_id) = btrim($1)
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(legacy_id)
        .fetch_optional(conn)
        .await?;

        Ok(book)
    }

    /// Whether any row other than `except_id` already uses `legacy_id`
    pub async fn code_in_use(
        conn: &mut PgConnection,
        legacy_id: &str,
        except_id: i64,
    ) -> Result<bool, DbError> {
        let in_use = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM libros WHERE btrim(legacy_id) = $1 AND id <> $2)",
        )
        .bind(legacy_id)
        .bind(except_id)
        .fetch_one(conn)
        .await?;

        Ok(in_use)
    }

    pub async fn relocate(
        conn: &mut PgConnection,
        id: i64,
        legacy_id: &str,
        location: &str,
    ) -> Result<Book, DbError> {
        let moved = sqlx::query_as::<_, Book>(
            r#"
            UPDATE libros
            SET legacy_id = $2, ubicacion = $3
            WHERE id = $1
            RETURNING id, legacy_id, titulo AS title, autor AS author, ubicacion AS location,
                      stock, precio AS price, created_at
            "#,
        )
        .bind(id)
        .bind(legacy_id)
        .bind(location)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            error!(id, legacy_id = %legacy_id, location = %location, error = %e, "Failed to move book");
            e
        })?;

        info!("Moved book {} to {} as {}", id, location, moved.legacy_id);
        Ok(moved)
    }

    #[instrument(skip(self))]
    pub async fn find_by_legacy_id(&self, legacy_id: &str) -> Result<Vec<Book>, DbError> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, legacy_id, titulo AS title, autor AS author, ubicacion AS location,
                   stock, precio AS price, created_at
            FROM libros
            WHERE legacy_id = $1
            ORDER BY id
            "#,
        )
        .bind(legacy_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    /// Top codes for a location in text order, optionally restricted to a prefix
    #[instrument(skip(self))]
    pub async fn top_codes(
        &self,
        location: &str,
        prefix: Option<&str>,
        limit: i64,
    ) -> Result<Vec<CodeSample>, DbError> {
        let like = prefix.map(|p| format!("{p}%"));
        let codes = sqlx::query_as::<_, CodeSample>(
            r#"
            SELECT legacy_id, titulo AS title
            FROM libros
            WHERE ubicacion = $1
              AND ($2::TEXT IS NULL OR legacy_id LIKE $2)
            ORDER BY legacy_id DESC
            LIMIT $3
            "#,
        )
        .bind(location)
        .bind(like)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} codes", codes.len());
        Ok(codes)
    }

    /// Most recently created rows for a location
    #[instrument(skip(self))]
    pub async fn recent_by_location(&self, location: &str, limit: i64) -> Result<Vec<Book>, DbError> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, legacy_id, titulo AS title, autor AS author, ubicacion AS location,
                   stock, precio AS price, created_at
            FROM libros
            WHERE ubicacion = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(location)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    #[instrument(skip(self))]
    pub async fn duplicate_codes(&self, location: &str) -> Result<Vec<DuplicateCode>, DbError> {
        let duplicates = sqlx::query_as::<_, DuplicateCode>(
            r#"
            SELECT legacy_id, COUNT(*) AS occurrences
            FROM libros
            WHERE ubicacion = $1
            GROUP BY legacy_id
            HAVING COUNT(*) > 1
            ORDER BY legacy_id
            "#,
        )
        .bind(location)
        .fetch_all(&self.pool)
        .await?;

        if !duplicates.is_empty() {
            info!("Found {} duplicated codes in {}", duplicates.len(), location);
        }
        Ok(duplicates)
    }

    /// Rewrite `libros.ubicacion` to canonical labels.
    ///
    /// Case and accent variants of every configured location are folded onto
    /// its canonical label, then `NULL`, empty, `-1`, `0` and `XXX...`
    /// placeholders go to General.
    #[instrument(skip(conn))]
    pub async fn normalize_locations(
        conn: &mut PgConnection,
    ) -> Result<Vec<NormalizationStep>, DbError> {
        let mut steps = Vec::new();

        for config in LOCATION_TABLE.iter() {
            let result = sqlx::query(
                r#"
                UPDATE libros
                SET ubicacion = $1
                WHERE ubicacion <> $1
                  AND translate(lower(btrim(ubicacion)), $3, $4) = $2
                "#,
            )
            .bind(config.label())
            .bind(fold_label(config.label()))
            .bind(FOLD_FROM)
            .bind(FOLD_TO)
            .execute(&mut *conn)
            .await?;

            steps.push(NormalizationStep {
                rule: format!("variants of {}", config.label()),
                rows_affected: result.rows_affected(),
            });
        }

        let general = Location::General.label();
        let placeholders = [
            (
                "invalid values (-1, 0)",
                "UPDATE libros SET ubicacion = $1 WHERE btrim(ubicacion) IN ('-1', '0')",
            ),
            (
                "NULL/empty values",
                "UPDATE libros SET ubicacion = $1 WHERE ubicacion IS NULL OR btrim(ubicacion) = ''",
            ),
            (
                "XXX placeholders",
                "UPDATE libros SET ubicacion = $1 WHERE btrim(ubicacion) LIKE 'XXX%'",
            ),
        ];

        for (rule, sql) in placeholders {
            let result = sqlx::query(sql).bind(general).execute(&mut *conn).await?;
            steps.push(NormalizationStep {
                rule: rule.to_string(),
                rows_affected: result.rows_affected(),
            });
        }

        let total: u64 = steps.iter().map(|s| s.rows_affected).sum();
        info!("Normalized {} location values", total);
        Ok(steps)
    }
}
