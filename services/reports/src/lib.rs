//! Reports - Analytical queries over the normalized sales store
//!
//! Responsibilities:
//! - Per-customer line items and totals
//! - Sales rollups by customer, region and country
//! - Regional and quarterly rankings
//! - Month rankings and the longest gap between orders
//!
//! The store is only read, never written.

pub mod queries;

pub use queries::*;
