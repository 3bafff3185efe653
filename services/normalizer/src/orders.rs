//! Fact builder for OrderDetail.
//!
//! Every data line carries parallel product, quantity and date lists for a
//! single customer. They are exploded into one fact row per position.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use crate::config::AlignmentPolicy;
use crate::error::{Error, Result};
use crate::lookup::{Dimension, Lookup};
use crate::pipeline::{LoadOptions, StageReport};
use crate::record::{columns, RawRecord, RecordReader};
use crate::schema::{self, create_table};
use crate::store::Store;

/// One exploded order position, still keyed by natural names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub line: u64,
    pub customer: String,
    pub product: String,
    pub order_date: NaiveDate,
    pub quantity: i64,
}

/// Explodes every record into order lines, keeping source line order and
/// then list order.
pub fn collect_order_lines<I>(records: I, policy: AlignmentPolicy) -> Result<Vec<OrderLine>>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut orders = Vec::new();
    for record in records {
        let record = record?;
        let products = record.multi(columns::PRODUCT_NAME);
        let quantities = record.multi(columns::QUANTITY_ORDERED);
        let dates = record.multi(columns::ORDER_DATE);
        let n = record.aligned_len(
            policy,
            &[
                (columns::PRODUCT_NAME, &products[..]),
                (columns::ORDER_DATE, &dates[..]),
                (columns::QUANTITY_ORDERED, &quantities[..]),
            ],
        )?;

        let customer = record.field(columns::NAME);
        for i in 0..n {
            orders.push(OrderLine {
                line: record.line(),
                customer: customer.to_string(),
                product: products[i].to_string(),
                order_date: parse_order_date(dates[i], record.line())?,
                quantity: parse_quantity(quantities[i], record.line())?,
            });
        }
    }
    Ok(orders)
}

/// Parses an 8-digit `YYYYMMDD` token.
pub fn parse_order_date(token: &str, line: u64) -> Result<NaiveDate> {
    let date_error = || Error::DateFormat {
        line,
        token: token.to_string(),
    };

    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(date_error());
    }
    NaiveDate::parse_from_str(token, "%Y%m%d").map_err(|_| date_error())
}

pub fn parse_quantity(token: &str, line: u64) -> Result<i64> {
    match token.parse::<i64>() {
        Ok(quantity) if quantity >= 1 => Ok(quantity),
        _ => Err(Error::InvalidQuantity {
            line,
            token: token.to_string(),
        }),
    }
}

pub async fn load_order_details(store: &Store, data: &Path, options: &LoadOptions) -> Result<StageReport> {
    let status = create_table(store, &schema::ORDER_DETAIL, options.create_mode).await?;
    let orders = collect_order_lines(RecordReader::open(data)?, options.alignment)?;

    let products = Lookup::build(store, Dimension::Product).await?;
    let customers = Lookup::build(store, Dimension::Customer).await?;

    let rows = orders
        .iter()
        .map(|order| {
            Ok((
                customers.resolve(&order.customer)?,
                products.resolve(&order.product)?,
                order,
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tx = store.pool().begin().await?;
    for (customer_id, product_id, order) in &rows {
        sqlx::query(
            "INSERT INTO OrderDetail (CustomerID, ProductID, OrderDate, QuantityOrdered) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(customer_id)
        .bind(product_id)
        .bind(order.order_date)
        .bind(order.quantity)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(rows = rows.len(), "order details loaded");
    Ok(StageReport::new(&schema::ORDER_DETAIL, status, rows.len()))
}
