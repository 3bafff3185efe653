//! Reports CLI
//!
//! Usage:
//!   cargo run --bin reports -- customer-total "Alice Smith"
//!   cargo run --bin reports -- --db normalized.db monthly-sales-ranking

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use normalizer::{Config, Store};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reports", about = "Runs analytical reports over a normalized sales store")]
struct Args {
    /// Store file (overrides NORMALIZED_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    report: Report,
}

#[derive(Subcommand, Debug)]
enum Report {
    /// Line items of one customer
    CustomerLineItems { name: String },
    /// Total of one customer
    CustomerTotal { name: String },
    /// Totals of every customer, largest first
    CustomerTotals,
    /// Totals of every region, largest first
    RegionTotals,
    /// Totals of every country, largest first
    CountryTotals,
    /// Countries ranked within their region
    CountryRegionalRanks,
    /// Best country of every region
    TopCountryPerRegion,
    /// Sales of every customer per quarter
    CustomerQuarterlySales,
    /// Five best customers of every quarter
    TopCustomersPerQuarter,
    /// Months ranked by sales
    MonthlySalesRanking,
    /// Longest gap between orders of every customer
    MaxDaysWithoutOrder,
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    rows: Vec<T>,
}

fn print_rows<T: Serialize>(rows: Vec<T>) -> Result<()> {
    info!(rows = rows.len(), "report complete");
    println!("{}", serde_json::to_string_pretty(&Output { rows })?);
    Ok(())
}

async fn run_report(store: &Store, report: Report) -> Result<()> {
    match report {
        Report::CustomerLineItems { name } => print_rows(reports::customer_line_items(store, &name).await?),
        Report::CustomerTotal { name } => {
            print_rows(reports::customer_total(store, &name).await?.into_iter().collect())
        }
        Report::CustomerTotals => print_rows(reports::customer_totals(store).await?),
        Report::RegionTotals => print_rows(reports::region_totals(store).await?),
        Report::CountryTotals => print_rows(reports::country_totals(store).await?),
        Report::CountryRegionalRanks => print_rows(reports::country_regional_ranks(store).await?),
        Report::TopCountryPerRegion => print_rows(reports::top_country_per_region(store).await?),
        Report::CustomerQuarterlySales => print_rows(reports::customer_quarterly_sales(store).await?),
        Report::TopCustomersPerQuarter => print_rows(reports::top_customers_per_quarter(store).await?),
        Report::MonthlySalesRanking => print_rows(reports::monthly_sales_ranking(store).await?),
        Report::MaxDaysWithoutOrder => print_rows(reports::max_days_without_order(store).await?),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let db_path = args.db.unwrap_or(config.db_path);

    let store = Store::open_read_only(&db_path)
        .await
        .with_context(|| format!("Failed to open store {}", db_path.display()))?;

    let result = run_report(&store, args.report).await;
    store.close().await;
    result
}
