use std::path::PathBuf;

use thiserror::Error;

use crate::lookup::Dimension;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("line {line}: expected at least {expected} tab-separated fields, found {found}")]
    MalformedRecord {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {field} has {len} values but {sibling} has {sibling_len}")]
    MisalignedFields {
        line: u64,
        field: &'static str,
        len: usize,
        sibling: &'static str,
        sibling_len: usize,
    },

    #[error("cannot build {dimension} lookup: table {} does not exist", dimension.table())]
    DictionaryBuild { dimension: Dimension },

    #[error("{dimension} '{key}' has no surrogate key")]
    KeyNotFound { dimension: Dimension, key: String },

    #[error("line {line}: order date '{token}' is not a YYYYMMDD date")]
    DateFormat { line: u64, token: String },

    #[error("line {line}: quantity '{token}' is not a positive integer")]
    InvalidQuantity { line: u64, token: String },

    #[error("line {line}: unit price '{token}' is not a non-negative number")]
    InvalidPrice { line: u64, token: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}
