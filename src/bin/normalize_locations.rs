use clap::Parser;
use libros_inventory::config::DatabaseSettings;
use libros_inventory::db::{self, BookRepository, LocationCount, LocationRepository, ReportRepository};
use libros_inventory::location::normalize_raw_label;
use tracing::info;

#[derive(Parser)]
#[command(name = "normalize-locations")]
#[command(about = "Fold location spellings and placeholders onto the canonical labels", long_about = None)]
struct Cli {
    /// Database connection string (prompts for DB_* settings when absent)
    #[arg(long, env)]
    database_url: Option<String>,

    /// Only print the planned changes
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
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
    let reports = ReportRepository::new(pool.clone());

    println!("=== NORMALIZE LOCATIONS ===");
    println!("\n[BEFORE] Current distribution:");
    let before = reports.location_distribution().await?;
    print_distribution(&before);

    let planned = plan(&before);
    println!("\n[PLANNED CHANGES]");
    if planned.is_empty() {
        println!("   Nothing to change.");
        return Ok(());
    }
    for (from, to, rows) in &planned {
        println!("   {from:<30} -> {to:<12} {rows:>10} rows");
    }

    if cli.dry_run {
        println!("\nDry run: no data was modified.");
        return Ok(());
    }

    if !cli.yes {
        print!("\n⚠️  This will update libros and ubicaciones. Continue? [y/N] ");
        std::io::Write::flush(&mut std::io::stdout())?;
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Normalization cancelled.");
            return Ok(());
        }
    }

    println!("\n[EXECUTING FIXES...]");
    let mut tx = pool.begin().await?;
    let steps = BookRepository::normalize_locations(&mut tx).await?;
    let renamed = LocationRepository::normalize_names(&mut tx).await?;
    tx.commit().await?;
    info!("Location normalization committed");

    for step in &steps {
        println!("   ✅ Fixed {}: {} rows", step.rule, step.rows_affected);
    }
    println!("   ✅ Renamed ubicaciones entries: {renamed} rows");

    println!("\n[AFTER] New distribution:");
    print_distribution(&reports.location_distribution().await?);

    println!("\n[UBICACIONES]");
    for location in LocationRepository::list_all_with(&pool).await? {
        let status = if location.active { "active" } else { "inactive" };
        println!("   ID: {} | Nombre: '{}' | {}", location.id, location.name, status);
    }

    println!("\n✅ Locations normalized successfully!");
    Ok(())
}

fn print_distribution(rows: &[LocationCount]) {
    for row in rows {
        println!("   {:<30} {:>10}", row.location, row.total);
    }
}

/// Rows whose label would change, as (current, canonical, count)
fn plan(distribution: &[LocationCount]) -> Vec<(String, &'static str, i64)> {
    distribution
        .iter()
        .filter_map(|row| {
            // The distribution query reports missing values as 'NULL'
            let raw = (row.location != "NULL").then_some(row.location.as_str());
            let canonical = normalize_raw_label(raw)?;
            (row.location != canonical).then(|| (row.location.clone(), canonical, row.total))
        })
        .collect()
}
