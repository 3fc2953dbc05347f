use tower_http::trace::TraceLayer;
use tracing::{info, instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use libros_inventory::api::{create_router, AppState};
use libros_inventory::config::Config;
use libros_inventory::db::{self, BookRepository, LocationRepository};
use libros_inventory::services::{CatalogService, CodeService};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,libros_inventory=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Starting libros inventory service with config: {:?}", config);

    let pool = db::pool::connect(config.database.connect_options()?, config.db_max_connections).await?;
    db::pool::migrate(&pool).await?;

    let book_repo = BookRepository::new(pool.clone());
    let location_repo = LocationRepository::new(pool.clone());

    let app_state = AppState {
        code_service: CodeService::new(book_repo.clone()),
        catalog_service: CatalogService::new(book_repo),
        location_repo,
    };
    let app = create_router(app_state).layer(TraceLayer::new_for_http());

    let addr = config.server_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
