use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, LocationRecord, LocationUpdate, NewLocation};
use crate::location::{fold_label, FOLD_FROM, FOLD_TO, LOCATION_TABLE};

/// Access to the `ubicaciones` lookup table
#[derive(Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<LocationRecord>, DbError> {
        let locations = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT id, nombre AS name, descripcion AS description, activa AS active, created_at
            FROM ubicaciones
            WHERE activa
            ORDER BY nombre
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} active locations", locations.len());
        Ok(locations)
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<LocationRecord>, DbError> {
        Self::list_all_with(&self.pool).await
    }

    pub async fn list_all_with<'e, E>(executor: E) -> Result<Vec<LocationRecord>, DbError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let locations = sqlx::query_as::<_, LocationRecord>(
            r#"
            SELECT id, nombre AS name, descripcion AS description, activa AS active, created_at
            FROM ubicaciones
            ORDER BY id
            "#,
        )
        .fetch_all(executor)
        .await?;

        Ok(locations)
    }

    #[instrument(skip(self, location), fields(name = %location.name))]
    pub async fn create(&self, location: &NewLocation) -> Result<LocationRecord, DbError> {
        let created = sqlx::query_as::<_, LocationRecord>(
            r#"
            INSERT INTO ubicaciones (nombre, descripcion, activa)
            VALUES ($1, $2, $3)
            RETURNING id, nombre AS name, descripcion AS description, activa AS active, created_at
            "#,
        )
        .bind(&location.name)
        .bind(&location.description)
        .bind(location.active.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;

        info!("Created location {} ({})", created.name, created.id);
        Ok(created)
    }

    /// Apply a partial update; `None` when no row has this id
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: i32,
        update: &LocationUpdate,
    ) -> Result<Option<LocationRecord>, DbError> {
        let updated = sqlx::query_as::<_, LocationRecord>(
            r#"
            UPDATE ubicaciones
            SET nombre = COALESCE($2, nombre),
                descripcion = COALESCE($3, descripcion),
                activa = COALESCE($4, activa)
            WHERE id = $1
            RETURNING id, nombre AS name, descripcion AS description, activa AS active, created_at
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.description)
        .bind(update.active)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_none() {
            warn!("Location {} not found", id);
        }
        Ok(updated)
    }

    /// Soft delete: locations are deactivated, never removed
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: i32) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE ubicaciones SET activa = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rename case and accent variants (`Galeon`, `almacen`) to the canonical labels
    #[instrument(skip(conn))]
    pub async fn normalize_names(conn: &mut PgConnection) -> Result<u64, DbError> {
        let mut total = 0;

        for config in LOCATION_TABLE.iter() {
            let canonical = config.label();
            let plain = fold_label(canonical);
            let result = sqlx::query(
                r#"
                UPDATE ubicaciones
                SET nombre = $1
                WHERE nombre <> $1
                  AND translate(lower(btrim(nombre)), $3, $4) = $2
                "#,
            )
            .bind(canonical)
            .bind(&plain)
            .bind(FOLD_FROM)
            .bind(FOLD_TO)
            .execute(&mut *conn)
            .await?;

            debug!("Renamed {} rows to {}", result.rows_affected(), canonical);
            total += result.rows_affected();
        }

        info!("Normalized {} location names", total);
        Ok(total)
    }
}
