//! Lookup dictionary providers: natural key → surrogate key.
//!
//! A lookup is always read back from the committed table. Nothing is cached
//! between calls, so a lookup reflects exactly what the store holds when it
//! is built.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{self, TableDef};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dimension {
    Region,
    Country,
    Customer,
    ProductCategory,
    Product,
}

impl Dimension {
    pub fn table_def(self) -> &'static TableDef {
        match self {
            Dimension::Region => &schema::REGION,
            Dimension::Country => &schema::COUNTRY,
            Dimension::Customer => &schema::CUSTOMER,
            Dimension::ProductCategory => &schema::PRODUCT_CATEGORY,
            Dimension::Product => &schema::PRODUCT,
        }
    }

    pub fn table(self) -> &'static str {
        self.table_def().name
    }

    /// Returns `(natural key, surrogate key)` pairs in surrogate key order.
    fn lookup_sql(self) -> &'static str {
        match self {
            Dimension::Region => "SELECT DISTINCT(Region), RegionID FROM Region ORDER BY RegionID",
            Dimension::Country => "SELECT DISTINCT(Country), CountryID FROM Country ORDER BY CountryID",
            Dimension::Customer => {
                r#"
                SELECT
                    CASE WHEN LastName = '' THEN FirstName ELSE FirstName || ' ' || LastName END,
                    CustomerID
                FROM Customer
                ORDER BY CustomerID
                "#
            }
            Dimension::ProductCategory => {
                "SELECT DISTINCT(ProductCategory), ProductCategoryID FROM ProductCategory ORDER BY ProductCategoryID"
            }
            Dimension::Product => "SELECT DISTINCT(ProductName), ProductID FROM Product ORDER BY ProductID",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    dimension: Dimension,
    ids: HashMap<String, i64>,
}

impl Lookup {
    /// Reads the committed `dimension` table into a fresh mapping.
    ///
    /// A natural key that occurs more than once (customers are not
    /// deduplicated) maps to its highest surrogate key.
    pub async fn build(store: &Store, dimension: Dimension) -> Result<Self> {
        if !store.table_exists(dimension.table()).await? {
            return Err(Error::DictionaryBuild { dimension });
        }

        let rows: Vec<(String, i64)> = sqlx::query_as(dimension.lookup_sql())
            .fetch_all(store.pool())
            .await?;

        let ids: HashMap<String, i64> = rows.into_iter().collect();
        debug!(%dimension, keys = ids.len(), "lookup built");
        Ok(Self { dimension, ids })
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.ids.get(key).copied()
    }

    pub fn resolve(&self, key: &str) -> Result<i64> {
        self.get(key).ok_or_else(|| Error::KeyNotFound {
            dimension: self.dimension,
            key: key.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
