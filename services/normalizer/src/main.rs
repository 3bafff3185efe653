//! Normalizer CLI
//!
//! Usage:
//!   # Full load into a fresh store:
//!   cargo run --bin normalizer -- --data data/orders.tsv --delete-db
//!
//!   # One stage at a time (caller keeps the dependency order):
//!   cargo run --bin normalizer -- --data data/orders.tsv --stage region

use anyhow::{Context, Result};
use clap::Parser;
use normalizer::{AlignmentPolicy, Config, CreateMode, LoadOptions, LoadSummary, Stage, Store};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "normalizer", about = "Normalizes a tab-delimited sales export into a relational store")]
struct Args {
    /// Tab-delimited sales export (overrides SALES_DATA)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Store file (overrides NORMALIZED_DB)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Delete the store file before loading
    #[arg(long, default_value = "false")]
    delete_db: bool,

    /// Drop and recreate tables instead of keeping existing ones
    #[arg(long, default_value = "false")]
    recreate: bool,

    /// Policy for sibling multi-valued fields of different lengths (overrides ALIGNMENT)
    #[arg(long, value_enum)]
    alignment: Option<AlignmentPolicy>,

    /// Run only this stage
    #[arg(long, value_enum)]
    stage: Option<Stage>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let data = args
        .data
        .or(config.data_file)
        .context("No sales export given: pass --data or set SALES_DATA")?;
    let db_path = args.db.unwrap_or(config.db_path);
    let options = LoadOptions {
        alignment: args.alignment.unwrap_or(config.alignment),
        create_mode: if args.recreate {
            CreateMode::DropAndRecreate
        } else {
            CreateMode::IfAbsent
        },
    };

    println!("=== Sales Normalizer ===");
    println!("Export: {}", data.display());
    println!("Store: {}", db_path.display());
    println!("Alignment: {:?}", options.alignment);

    let store = Store::open(&db_path, args.delete_db)
        .await
        .context("Failed to open store")?;

    let result = match args.stage {
        Some(stage) => normalizer::run_stage(&store, &data, stage, &options)
            .await
            .map(|report| LoadSummary { stages: vec![report] }),
        None => normalizer::run(&store, &data, &options).await,
    };

    store.close().await;
    let summary = result.context("Load failed")?;

    println!("\n=== Load Complete ===");
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("Rows inserted: {}", summary.total_rows());

    Ok(())
}
