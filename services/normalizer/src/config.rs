//! Runtime configuration.
//!
//! Values come from the environment (optionally seeded from `.env` by the
//! binaries) and may be overridden by command line flags.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{Error, Result};

/// Store path used when `NORMALIZED_DB` is not set.
pub const DEFAULT_DB_PATH: &str = "normalized.db";

/// How sibling `;`-joined lists of different lengths on one line are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Pair values up to the shortest list and drop the rest.
    #[default]
    Truncate,
    /// Reject the line with `Error::MisalignedFields`.
    Strict,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub data_file: Option<PathBuf>,
    pub alignment: AlignmentPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let alignment = match var("ALIGNMENT") {
            Some(raw) => AlignmentPolicy::from_str(raw.trim(), true)
                .map_err(|_| Error::Config(format!("ALIGNMENT must be 'truncate' or 'strict', got '{}'", raw)))?,
            None => AlignmentPolicy::default(),
        };

        Ok(Self {
            db_path: PathBuf::from(var("NORMALIZED_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string())),
            data_file: var("SALES_DATA").map(PathBuf::from),
            alignment,
        })
    }
}
