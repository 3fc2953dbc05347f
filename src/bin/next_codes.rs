use clap::Parser;
use libros_inventory::config::DatabaseSettings;
use libros_inventory::db::{self, BookRepository};
use libros_inventory::services::{CodeService, NextCodePreview};

#[derive(Parser)]
#[command(name = "next-codes")]
#[command(about = "Show the next legacy code for each location. No data is modified.", long_about = None)]
struct Cli {
    /// Database connection string (prompts for DB_* settings when absent)
    #[arg(long, env)]
    database_url: Option<String>,

    /// Only show this location
    #[arg(long)]
    location: Option<String>,

    /// Number of existing codes to list per location
    #[arg(long, default_value = "5")]
    limit: usize,
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
    let settings = DatabaseSettings::from_url_or_env(cli.database_url)?;
    let pool = db::pool::connect(settings.connect_options()?, 2).await?;

    let service = CodeService::new(BookRepository::new(pool)).with_top_codes(cli.limit);
    let previews = match &cli.location {
        Some(location) => vec![service.preview(location).await?],
        None => service.preview_all().await?,
    };

    println!("=== NEXT LEGACY CODES (WITH OUTLIER FILTERS) ===");
    for preview in &previews {
        print_preview(preview);
    }

    println!("\n{}", "=".repeat(70));
    println!("✅ Done. No data was modified.");
    Ok(())
}

fn print_preview(preview: &NextCodePreview) {
    let ceiling = preview
        .outlier_ceiling
        .map(|c| format!("< {c}"))
        .unwrap_or_else(|| "none".to_string());

    println!("\n{}", "=".repeat(70));
    println!("LOCATION: {}", preview.location);
    println!("  Suffix: '{}' | Filter: {}", preview.suffix, ceiling);
    println!("{}", "=".repeat(70));

    if preview.top_codes.is_empty() {
        println!("  ⚠️  No codes found");
    } else {
        println!("  Top {} codes (after filtering):", preview.top_codes.len());
        for code in &preview.top_codes {
            println!("    - {code}");
        }
    }

    if let Some(current_max) = &preview.current_max {
        println!("\n  ✅ Current MAX: {current_max}");
    }
    println!("  ✅ NEXT code: {}", preview.next_code);
}
