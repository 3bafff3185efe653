//! Stage orchestration.
//!
//! Stages read back their upstream dimension from the store, so they must run
//! in dependency order: Region → Country → Customer, ProductCategory →
//! Product, then OrderDetail. [`run`] walks that order; [`run_stage`] runs a
//! single stage and leaves ordering to the caller.

use std::path::Path;

use clap::ValueEnum;
use serde::Serialize;
use tracing::info;

use crate::config::AlignmentPolicy;
use crate::dimensions;
use crate::error::Result;
use crate::orders;
use crate::schema::{self, CreateMode, TableDef, TableStatus};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub alignment: AlignmentPolicy,
    pub create_mode: CreateMode,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            alignment: AlignmentPolicy::Truncate,
            create_mode: CreateMode::IfAbsent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Region,
    Country,
    Customer,
    ProductCategory,
    Product,
    OrderDetail,
}

impl Stage {
    /// Dependency order.
    pub const ALL: [Stage; 6] = [
        Stage::Region,
        Stage::Country,
        Stage::Customer,
        Stage::ProductCategory,
        Stage::Product,
        Stage::OrderDetail,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub table: &'static str,
    pub status: TableStatus,
    pub rows: usize,
}

impl StageReport {
    pub fn new(table: &TableDef, status: TableStatus, rows: usize) -> Self {
        Self {
            table: table.name,
            status,
            rows,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub stages: Vec<StageReport>,
}

impl LoadSummary {
    pub fn total_rows(&self) -> usize {
        self.stages.iter().map(|s| s.rows).sum()
    }
}

pub async fn run_stage(store: &Store, data: &Path, stage: Stage, options: &LoadOptions) -> Result<StageReport> {
    info!(?stage, data = %data.display(), "running stage");
    match stage {
        Stage::Region => dimensions::load_regions(store, data, options).await,
        Stage::Country => dimensions::load_countries(store, data, options).await,
        Stage::Customer => dimensions::load_customers(store, data, options).await,
        Stage::ProductCategory => dimensions::load_categories(store, data, options).await,
        Stage::Product => dimensions::load_products(store, data, options).await,
        Stage::OrderDetail => orders::load_order_details(store, data, options).await,
    }
}

/// Runs every stage in dependency order, stopping at the first failure.
///
/// With `CreateMode::DropAndRecreate` all tables are dropped up front,
/// children first, so the parents can be recreated under enforced foreign
/// keys.
pub async fn run(store: &Store, data: &Path, options: &LoadOptions) -> Result<LoadSummary> {
    if options.create_mode == CreateMode::DropAndRecreate {
        schema::drop_all(store).await?;
    }

    let mut summary = LoadSummary::default();
    for stage in Stage::ALL {
        summary.stages.push(run_stage(store, data, stage, options).await?);
    }

    info!(rows = summary.total_rows(), "load complete");
    Ok(summary)
}
