use clap::Parser;
use libros_inventory::config::DatabaseSettings;
use libros_inventory::db::{self, BookRepository};
use libros_inventory::legacy_code::next_code_for;
use libros_inventory::location::LocationTable;

#[derive(Parser)]
#[command(name = "check-location-codes")]
#[command(about = "Inspect the legacy codes recorded for one location", long_about = None)]
struct Cli {
    /// Location label (accents and case are ignored)
    location: String,

    /// Database connection string (prompts for DB_* settings when absent)
    #[arg(long, env)]
    database_url: Option<String>,

    /// Only list codes starting with this prefix (e.g. 0229)
    #[arg(long)]
    prefix: Option<String>,

    /// Number of top codes to list
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(i64).range(0..))]
    limit: i64,

    /// Number of recently created rows to list
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(i64).range(0..))]
    recent: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = LocationTable::default().lookup(&cli.location)?;
    let location = config.label();

    let settings = DatabaseSettings::from_url_or_env(cli.database_url)?;
    let pool = db::pool::connect(settings.connect_options()?, 2).await?;
    let repo = BookRepository::new(pool);

    match &cli.prefix {
        Some(prefix) => println!("\n--- {location} TOP {} CODES STARTING WITH '{prefix}' ---", cli.limit),
        None => println!("\n--- {location} TOP {} CODES ---", cli.limit),
    }
    let codes = repo.top_codes(location, cli.prefix.as_deref(), cli.limit).await?;
    if codes.is_empty() {
        println!("   ⚠️  No codes found");
    }
    for code in &codes {
        let title = code.title.as_deref().unwrap_or("N/A");
        println!("   - {} | {}", code.legacy_id, truncate(title, 50));
    }

    // Text order is not numeric order; recompute the max the allocator would see
    match next_code_for(config, codes.iter().map(|c| c.legacy_id.as_str())) {
        Ok(next) => println!("\n   ✅ NEXT code from this range: {next}"),
        Err(e) => println!("\n   ⚠️  {e}"),
    }

    println!("\n--- {location} RECENTLY CREATED (ID DESC) ---");
    for book in repo.recent_by_location(location, cli.recent).await? {
        println!(
            "   {} | {} | {} | {}",
            book.legacy_id,
            book.id,
            truncate(book.title.as_deref().unwrap_or("N/A"), 40),
            book.created_at
        );
    }

    println!("\n--- CHECK FOR DUPLICATES IN {location} ---");
    let duplicates = repo.duplicate_codes(location).await?;
    if duplicates.is_empty() {
        println!("   No duplicates found in {location}.");
    } else {
        println!("   Found {} duplicates:", duplicates.len());
        for duplicate in &duplicates {
            println!("   {} x{}", duplicate.legacy_id, duplicate.occurrences);
        }
    }

    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
