use clap::Parser;
use libros_inventory::config::DatabaseSettings;
use libros_inventory::db::{self, BookRepository, NewBook};
use libros_inventory::services::CatalogService;

#[derive(Parser)]
#[command(name = "catalog-book")]
#[command(about = "Catalogue a book with the next legacy code for its location", long_about = None)]
struct Cli {
    /// Database connection string (prompts for DB_* settings when absent)
    #[arg(long, env)]
    database_url: Option<String>,

    /// Location label (accents and case are ignored)
    #[arg(long)]
    location: String,

    #[arg(long)]
    title: String,

    #[arg(long)]
    author: Option<String>,

    #[arg(long, default_value = "1")]
    stock: i32,

    /// Price in euros
    #[arg(long)]
    price: Option<f64>,
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

    let book = NewBook {
        title: cli.title,
        author: cli.author,
        location: cli.location,
        stock: cli.stock,
        price: cli.price,
    };
    let inserted = service.catalog(&book).await?;

    println!(
        "✅ Catalogued \"{}\" as {} at {} (id {})",
        book.title,
        inserted.legacy_id,
        inserted.location.as_deref().unwrap_or("N/A"),
        inserted.id
    );
    Ok(())
}
