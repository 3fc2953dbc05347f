use clap::Parser;
use libros_inventory::config::DatabaseSettings;
use libros_inventory::db::{self, BookRepository};
use libros_inventory::services::CatalogService;

#[derive(Parser)]
#[command(name = "move-book")]
#[command(about = "Move a book to another location, recoding it for that location's pool", long_about = None)]
struct Cli {
    /// Database connection string (prompts for DB_* settings when absent)
    #[arg(long, env)]
    database_url: Option<String>,

    /// Current legacy code of the book
    code: String,

    /// Destination location (accents and case are ignored)
    #[arg(long)]
    to: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = DatabaseSettings::from_url_or_env(cli.database_url)?;
    let pool = db::pool::connect(settings.connect_options()?, 2).await?;
    let service = CatalogService::new(BookRepository::new(pool));

    match service.relocate(&cli.code, &cli.to).await? {
        Some(book) => {
            println!(
                "✅ {} -> {} at {} (id {})",
                cli.code,
                book.legacy_id,
                book.location.as_deref().unwrap_or("N/A"),
                book.id
            );
            Ok(())
        }
        None => Err(format!("No book with code {}", cli.code).into()),
    }
}
