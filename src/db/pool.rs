use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::db::DbError;

/// Open a pool against the inventory database
#[instrument(skip(options), fields(host = %options.get_host(), database = ?options.get_database()))]
pub async fn connect(options: PgConnectOptions, max_connections: u32) -> Result<PgPool, DbError> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    info!("Database connection established");
    Ok(pool)
}

/// Apply the schema in `migrations/`
pub async fn migrate(pool: &PgPool) -> Result<(), DbError> {
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
