use clap::Parser;
use libros_inventory::config::DatabaseSettings;
use libros_inventory::db::{self, BookRepository, ReportRepository};

#[derive(Parser)]
#[command(name = "verify-inventory")]
#[command(about = "Verify counts, distributions and data quality of the inventory", long_about = None)]
struct Cli {
    /// Database connection string (prompts for DB_* settings when absent)
    #[arg(long, env)]
    database_url: Option<String>,

    /// Expected number of books (e.g. after a bulk import)
    #[arg(long)]
    expected_total: Option<i64>,

    /// Allowed distance from --expected-total
    #[arg(long, default_value = "500")]
    tolerance: i64,

    /// Legacy codes to print as samples
    #[arg(long = "sample")]
    samples: Vec<String>,
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
    let reports = ReportRepository::new(pool.clone());
    let books = BookRepository::new(pool);

    println!("=== INVENTORY VERIFICATION ===");

    println!("\n[1] TOTAL COUNT");
    let total = reports.count_books().await?;
    println!("   Total libros: {total}");
    if let Some(expected) = cli.expected_total {
        let status = if (total - expected).abs() <= cli.tolerance {
            "✅ OK"
        } else {
            "❌ MISMATCH"
        };
        println!("   Expected: ~{expected} (±{})", cli.tolerance);
        println!("   Status: {status}");
    }

    println!("\n[2] STOCK DISTRIBUTION");
    for bucket in reports.stock_distribution().await? {
        println!("   {:<20} {:>10}", bucket.bucket, bucket.total);
    }

    println!("\n[3] LOCATION DISTRIBUTION");
    for row in reports.location_distribution().await? {
        println!("   {:<30} {:>10} libros", row.location, row.total);
    }

    if !cli.samples.is_empty() {
        println!("\n[4] SAMPLE BOOKS");
        println!(
            "   {:<12} {:<40} {:<8} {:<15} Precio",
            "Legacy ID", "Título", "Stock", "Ubicación"
        );
        println!("   {}", "-".repeat(90));
        for code in &cli.samples {
            let found = books.find_by_legacy_id(code).await?;
            if found.is_empty() {
                println!("   {code:<12} (not found)");
            }
            for book in found {
                let price = book
                    .price
                    .map(|p| format!("€{p:.2}"))
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "   {:<12} {:<40} {:<8} {:<15} {}",
                    book.legacy_id,
                    book.title.as_deref().unwrap_or("N/A").chars().take(40).collect::<String>(),
                    book.stock,
                    book.location.as_deref().unwrap_or("N/A"),
                    price
                );
            }
        }
    }

    println!("\n[5] DATA QUALITY CHECK");
    let quality = reports.data_quality().await?;
    println!("   Sin título: {}", quality.missing_title);
    println!("   Sin autor: {}", quality.missing_author);
    println!("   Sin precio válido: {}", quality.missing_price);
    println!("   Sin ubicación: {}", quality.missing_location);

    println!("\n[6] LEGACY_ID UNIQUENESS");
    let uniqueness = reports.uniqueness().await?;
    println!("   Unique legacy_ids: {}", uniqueness.unique_ids);
    println!("   Total records: {}", uniqueness.total_records);
    if uniqueness.all_unique() {
        println!("   Status: ✅ All unique");
    } else {
        println!("   Status: ❌ Duplicates found");
    }

    println!("\n✅ Verification complete!");
    Ok(())
}
