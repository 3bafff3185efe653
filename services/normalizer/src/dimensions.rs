//! Dimension builders.
//!
//! Each builder first collects its rows from the export in a deterministic
//! order, then loads them in one transaction. Surrogate keys come from
//! insertion order, so the collection order is the key assignment order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::AlignmentPolicy;
use crate::error::{Error, Result};
use crate::lookup::{Dimension, Lookup};
use crate::pipeline::{LoadOptions, StageReport};
use crate::record::{columns, RawRecord, RecordReader};
use crate::schema::{self, create_table};
use crate::store::Store;

// =============================================================================
// Row collection
// =============================================================================

/// Distinct region names, ascending.
pub fn collect_regions<I>(records: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut regions = BTreeSet::new();
    for record in records {
        let record = record?;
        regions.insert(record.field(columns::REGION).to_string());
    }
    Ok(regions.into_iter().collect())
}

/// `(country, region)` pairs, one per country, ascending by country.
///
/// Pairs are sorted before they are keyed by country, so a country listed
/// under several regions keeps the greatest region name.
pub fn collect_countries<I>(records: I) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut pairs = Vec::new();
    for record in records {
        let record = record?;
        pairs.push((
            record.field(columns::COUNTRY).to_string(),
            record.field(columns::REGION).to_string(),
        ));
    }
    pairs.sort();

    let by_country: BTreeMap<String, String> = pairs.into_iter().collect();
    Ok(by_country.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerRow {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

/// One customer per data line, sorted by (full name, address, city, country).
///
/// Customers are deliberately not deduplicated.
pub fn collect_customers<I>(records: I) -> Result<Vec<CustomerRow>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut quads = Vec::new();
    for record in records {
        let record = record?;
        quads.push([
            record.field(columns::NAME).to_string(),
            record.field(columns::ADDRESS).to_string(),
            record.field(columns::CITY).to_string(),
            record.field(columns::COUNTRY).to_string(),
        ]);
    }
    quads.sort();

    Ok(quads
        .into_iter()
        .map(|[full_name, address, city, country]| {
            let (first, last) = split_full_name(&full_name);
            CustomerRow {
                first_name: first.to_string(),
                last_name: last.to_string(),
                address,
                city,
                country,
            }
        })
        .collect())
}

/// Splits on the first space; a single-word name has an empty last name.
pub fn split_full_name(full_name: &str) -> (&str, &str) {
    full_name.split_once(' ').unwrap_or((full_name, ""))
}

/// `(category, description)` pairs ascending by category.
///
/// Lines are merged in source order and the last description seen for a
/// category wins.
pub fn collect_categories<I>(records: I, policy: AlignmentPolicy) -> Result<Vec<(String, String)>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut merged = BTreeMap::new();
    for record in records {
        let record = record?;
        let names = record.multi(columns::PRODUCT_CATEGORY);
        let descriptions = record.multi(columns::PRODUCT_CATEGORY_DESCRIPTION);
        let n = record.aligned_len(
            policy,
            &[
                (columns::PRODUCT_CATEGORY, &names[..]),
                (columns::PRODUCT_CATEGORY_DESCRIPTION, &descriptions[..]),
            ],
        )?;

        for i in 0..n {
            merged.insert(names[i].to_string(), descriptions[i].to_string());
        }
    }
    Ok(merged.into_iter().collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub name: String,
    pub category: String,
    pub unit_price: f64,
}

/// Products ascending by name, merged across lines last-write-wins.
pub fn collect_products<I>(records: I, policy: AlignmentPolicy) -> Result<Vec<ProductRow>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut merged: BTreeMap<String, (String, f64)> = BTreeMap::new();
    for record in records {
        let record = record?;
        let names = record.multi(columns::PRODUCT_NAME);
        let categories = record.multi(columns::PRODUCT_CATEGORY);
        let prices = record.multi(columns::PRODUCT_UNIT_PRICE);
        let n = record.aligned_len(
            policy,
            &[
                (columns::PRODUCT_NAME, &names[..]),
                (columns::PRODUCT_CATEGORY, &categories[..]),
                (columns::PRODUCT_UNIT_PRICE, &prices[..]),
            ],
        )?;

        for i in 0..n {
            let price = parse_price(prices[i], record.line())?;
            merged.insert(names[i].to_string(), (categories[i].to_string(), price));
        }
    }

    Ok(merged
        .into_iter()
        .map(|(name, (category, unit_price))| ProductRow {
            name,
            category,
            unit_price,
        })
        .collect())
}

fn parse_price(token: &str, line: u64) -> Result<f64> {
    match token.parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(Error::InvalidPrice {
            line,
            token: token.to_string(),
        }),
    }
}

// =============================================================================
// Loading
// =============================================================================

pub async fn load_regions(store: &Store, data: &Path, options: &LoadOptions) -> Result<StageReport> {
    let status = create_table(store, &schema::REGION, options.create_mode).await?;
    let regions = collect_regions(RecordReader::open(data)?)?;

    let mut tx = store.pool().begin().await?;
    for region in &regions {
        sqlx::query("INSERT INTO Region (Region) VALUES (?1)")
            .bind(region)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(rows = regions.len(), "regions loaded");
    Ok(StageReport::new(&schema::REGION, status, regions.len()))
}

pub async fn load_countries(store: &Store, data: &Path, options: &LoadOptions) -> Result<StageReport> {
    let status = create_table(store, &schema::COUNTRY, options.create_mode).await?;
    let countries = collect_countries(RecordReader::open(data)?)?;
    let regions = Lookup::build(store, Dimension::Region).await?;

    let rows = countries
        .iter()
        .map(|(country, region)| Ok((country, regions.resolve(region)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut tx = store.pool().begin().await?;
    for (country, region_id) in &rows {
        sqlx::query("INSERT INTO Country (Country, RegionID) VALUES (?1, ?2)")
            .bind(*country)
            .bind(region_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(rows = rows.len(), "countries loaded");
    Ok(StageReport::new(&schema::COUNTRY, status, rows.len()))
}

pub async fn load_customers(store: &Store, data: &Path, options: &LoadOptions) -> Result<StageReport> {
    let status = create_table(store, &schema::CUSTOMER, options.create_mode).await?;
    let customers = collect_customers(RecordReader::open(data)?)?;
    let countries = Lookup::build(store, Dimension::Country).await?;

    let rows = customers
        .iter()
        .map(|customer| Ok((customer, countries.resolve(&customer.country)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut tx = store.pool().begin().await?;
    for (customer, country_id) in &rows {
        sqlx::query(
            "INSERT INTO Customer (FirstName, LastName, Address, City, CountryID) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(country_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(rows = rows.len(), "customers loaded");
    Ok(StageReport::new(&schema::CUSTOMER, status, rows.len()))
}

pub async fn load_categories(store: &Store, data: &Path, options: &LoadOptions) -> Result<StageReport> {
    let status = create_table(store, &schema::PRODUCT_CATEGORY, options.create_mode).await?;
    let categories = collect_categories(RecordReader::open(data)?, options.alignment)?;

    let mut tx = store.pool().begin().await?;
    for (name, description) in &categories {
        sqlx::query("INSERT INTO ProductCategory (ProductCategory, ProductCategoryDescription) VALUES (?1, ?2)")
            .bind(name)
            .bind(description)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(rows = categories.len(), "product categories loaded");
    Ok(StageReport::new(&schema::PRODUCT_CATEGORY, status, categories.len()))
}

pub async fn load_products(store: &Store, data: &Path, options: &LoadOptions) -> Result<StageReport> {
    let status = create_table(store, &schema::PRODUCT, options.create_mode).await?;
    let products = collect_products(RecordReader::open(data)?, options.alignment)?;
    let categories = Lookup::build(store, Dimension::ProductCategory).await?;

    let rows = products
        .iter()
        .map(|product| Ok((product, categories.resolve(&product.category)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut tx = store.pool().begin().await?;
    for (product, category_id) in &rows {
        sqlx::query("INSERT INTO Product (ProductName, ProductUnitPrice, ProductCategoryID) VALUES (?1, ?2, ?3)")
            .bind(&product.name)
            .bind(product.unit_price)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(rows = rows.len(), "products loaded");
    Ok(StageReport::new(&schema::PRODUCT, status, rows.len()))
}
