//! Normalizer - Loads a flat sales export into a relational store
//!
//! Responsibilities:
//! - Read the tab-delimited export line by line
//! - Derive the Region, Country, Customer, ProductCategory and Product
//!   dimensions with surrogate keys assigned in deterministic order
//! - Explode the multi-valued order fields into OrderDetail facts
//! - Bridge names to surrogate keys through lookups read back from the store
//!
//! Same export + fresh store = same keys and rows.

pub mod config;
pub mod dimensions;
pub mod error;
pub mod lookup;
pub mod orders;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod store;

pub use config::{AlignmentPolicy, Config, DEFAULT_DB_PATH};
pub use error::{Error, Result};
pub use lookup::{Dimension, Lookup};
pub use pipeline::{run, run_stage, LoadOptions, LoadSummary, Stage, StageReport};
pub use schema::{CreateMode, TableStatus};
pub use store::Store;
