//! Analytical queries over the normalized store.
//!
//! Every query is read-only. Per-customer reports take the customer's
//! display name and resolve it through a freshly built Customer lookup.

use normalizer::{Dimension, Lookup, Result, Store};
use serde::Serialize;

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct CustomerLineItem {
    pub name: String,
    pub product_name: String,
    pub order_date: String,
    pub product_unit_price: f64,
    pub quantity_ordered: i64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct CustomerTotal {
    pub name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct RegionTotal {
    pub region: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct CountryTotal {
    pub country: String,
    pub country_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct CountryRegionalRank {
    pub region: String,
    pub country: String,
    pub country_total: f64,
    pub country_regional_rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct QuarterlySales {
    #[serde(rename = "Quarter")]
    #[sqlx(rename = "Quarter")]
    pub quarter: String,
    #[serde(rename = "Year")]
    #[sqlx(rename = "Year")]
    pub year: i64,
    #[serde(rename = "CustomerID")]
    #[sqlx(rename = "CustomerID")]
    pub customer_id: i64,
    #[serde(rename = "Total")]
    #[sqlx(rename = "Total")]
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct QuarterlyCustomerRank {
    #[serde(rename = "Quarter")]
    #[sqlx(rename = "Quarter")]
    pub quarter: String,
    #[serde(rename = "Year")]
    #[sqlx(rename = "Year")]
    pub year: i64,
    #[serde(rename = "CustomerID")]
    #[sqlx(rename = "CustomerID")]
    pub customer_id: i64,
    #[serde(rename = "Total")]
    #[sqlx(rename = "Total")]
    pub total: f64,
    #[serde(rename = "CustomerRank")]
    #[sqlx(rename = "CustomerRank")]
    pub customer_rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "PascalCase")]
#[sqlx(rename_all = "PascalCase")]
pub struct MonthlySales {
    pub month: String,
    pub total: f64,
    pub total_rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct OrderGap {
    #[serde(rename = "CustomerID")]
    #[sqlx(rename = "CustomerID")]
    pub customer_id: i64,
    #[serde(rename = "FirstName")]
    #[sqlx(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    #[sqlx(rename = "LastName")]
    pub last_name: String,
    #[serde(rename = "Country")]
    #[sqlx(rename = "Country")]
    pub country: String,
    #[serde(rename = "OrderDate")]
    #[sqlx(rename = "OrderDate")]
    pub order_date: String,
    #[serde(rename = "PreviousOrderDate")]
    #[sqlx(rename = "PreviousOrderDate")]
    pub previous_order_date: Option<String>,
    #[serde(rename = "MaxDaysWithoutOrder")]
    #[sqlx(rename = "MaxDaysWithoutOrder")]
    pub max_days_without_order: Option<f64>,
}

// ============================================================================
// SQL
// ============================================================================

/// Display name matching the Customer lookup key: no trailing space when the
/// last name is empty.
macro_rules! customer_name {
    () => {
        "CASE WHEN c.LastName = '' THEN c.FirstName ELSE c.FirstName || ' ' || c.LastName END"
    };
}

const CUSTOMER_LINE_ITEMS: &str = concat!(
    r#"
    SELECT
        "#,
    customer_name!(),
    r#" AS Name,
        p.ProductName,
        o.OrderDate,
        p.ProductUnitPrice,
        o.QuantityOrdered,
        ROUND(p.ProductUnitPrice * o.QuantityOrdered, 2) AS Total
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    WHERE c.CustomerID = ?1
    ORDER BY o.OrderID
"#
);

const CUSTOMER_TOTAL: &str = concat!(
    r#"
    SELECT
        "#,
    customer_name!(),
    r#" AS Name,
        ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered), 2) AS Total
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    WHERE c.CustomerID = ?1
    GROUP BY 1
"#
);

const CUSTOMER_TOTALS: &str = concat!(
    r#"
    SELECT
        "#,
    customer_name!(),
    r#" AS Name,
        ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered), 2) AS Total
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    GROUP BY 1
    ORDER BY 2 DESC
"#
);

const REGION_TOTALS: &str = r#"
    SELECT
        r.Region,
        ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered), 2) AS Total
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    JOIN Country ct ON c.CountryID = ct.CountryID
    JOIN Region r ON ct.RegionID = r.RegionID
    GROUP BY 1
    ORDER BY 2 DESC
"#;

const COUNTRY_TOTALS: &str = r#"
    SELECT
        ct.Country,
        ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered)) AS CountryTotal
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    JOIN Country ct ON c.CountryID = ct.CountryID
    GROUP BY 1
    ORDER BY 2 DESC
"#;

const COUNTRY_REGIONAL_RANKS: &str = r#"
    SELECT
        r.Region,
        ct.Country,
        ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered)) AS CountryTotal,
        rank() OVER (
            PARTITION BY r.Region
            ORDER BY ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered)) DESC
        ) AS CountryRegionalRank
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    JOIN Country ct ON c.CountryID = ct.CountryID
    JOIN Region r ON ct.RegionID = r.RegionID
    GROUP BY 1, 2
    ORDER BY 1 ASC, 4 ASC
"#;

const TOP_COUNTRY_PER_REGION: &str = r#"
    WITH CountryRanks AS (
        SELECT
            r.Region,
            ct.Country,
            ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered)) AS CountryTotal,
            rank() OVER (
                PARTITION BY r.Region
                ORDER BY ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered)) DESC
            ) AS CountryRegionalRank
        FROM OrderDetail o
        JOIN Customer c ON o.CustomerID = c.CustomerID
        JOIN Product p ON o.ProductID = p.ProductID
        JOIN Country ct ON c.CountryID = ct.CountryID
        JOIN Region r ON ct.RegionID = r.RegionID
        GROUP BY 1, 2
    )
    SELECT * FROM CountryRanks
    WHERE CountryRegionalRank = 1
    ORDER BY Region ASC
"#;

const CUSTOMER_SALES_BY_QUARTER: &str = r#"
    SELECT
        CASE
            WHEN 0 + strftime('%m', o.OrderDate) BETWEEN 1 AND 3 THEN 'Q1'
            WHEN 0 + strftime('%m', o.OrderDate) BETWEEN 4 AND 6 THEN 'Q2'
            WHEN 0 + strftime('%m', o.OrderDate) BETWEEN 7 AND 9 THEN 'Q3'
            WHEN 0 + strftime('%m', o.OrderDate) BETWEEN 10 AND 12 THEN 'Q4'
        END AS Quarter,
        CAST(strftime('%Y', o.OrderDate) AS INT) AS Year,
        c.CustomerID,
        ROUND(SUM(p.ProductUnitPrice * o.QuantityOrdered)) AS Total
    FROM OrderDetail o
    JOIN Customer c ON o.CustomerID = c.CustomerID
    JOIN Product p ON o.ProductID = p.ProductID
    GROUP BY 1, 2, 3
"#;

const MONTHLY_SALES_RANKING: &str = r#"
    WITH MonthTotals AS (
        SELECT
            CASE strftime('%m', o.OrderDate)
                WHEN '01' THEN 'January'
                WHEN '02' THEN 'February'
                WHEN '03' THEN 'March'
                WHEN '04' THEN 'April'
                WHEN '05' THEN 'May'
                WHEN '06' THEN 'June'
                WHEN '07' THEN 'July'
                WHEN '08' THEN 'August'
                WHEN '09' THEN 'September'
                WHEN '10' THEN 'October'
                WHEN '11' THEN 'November'
                WHEN '12' THEN 'December'
            END AS Month,
            SUM(ROUND(p.ProductUnitPrice * o.QuantityOrdered)) AS Total
        FROM OrderDetail o
        JOIN Product p ON o.ProductID = p.ProductID
        GROUP BY 1
    )
    SELECT
        Month,
        Total,
        rank() OVER (ORDER BY Total DESC) AS TotalRank
    FROM MonthTotals
    ORDER BY TotalRank
"#;

const MAX_DAYS_WITHOUT_ORDER: &str = r#"
    WITH OrderDates AS (
        SELECT
            CustomerID,
            OrderDate,
            LAG(OrderDate, 1) OVER (PARTITION BY CustomerID ORDER BY OrderDate ASC) AS PreviousOrderDate
        FROM OrderDetail
    ), MaxDays AS (
        SELECT
            CustomerID,
            OrderDate,
            PreviousOrderDate,
            MAX(julianday(OrderDate) - julianday(PreviousOrderDate)) AS MaxDaysWithoutOrder
        FROM OrderDates
        GROUP BY 1
    )
    SELECT
        m.CustomerID,
        c.FirstName,
        c.LastName,
        ct.Country,
        m.OrderDate,
        m.PreviousOrderDate,
        m.MaxDaysWithoutOrder
    FROM MaxDays m
    JOIN Customer c ON m.CustomerID = c.CustomerID
    JOIN Country ct ON c.CountryID = ct.CountryID
    ORDER BY m.MaxDaysWithoutOrder DESC, m.CustomerID
"#;

// ============================================================================
// Queries
// ============================================================================

async fn customer_id(store: &Store, customer_name: &str) -> Result<i64> {
    Lookup::build(store, Dimension::Customer)
        .await?
        .resolve(customer_name)
}

/// Every line item of one customer, each rounded to cents on its own.
pub async fn customer_line_items(store: &Store, customer_name: &str) -> Result<Vec<CustomerLineItem>> {
    let id = customer_id(store, customer_name).await?;
    Ok(sqlx::query_as(CUSTOMER_LINE_ITEMS)
        .bind(id)
        .fetch_all(store.pool())
        .await?)
}

/// One customer's total, summed first and rounded to cents after.
pub async fn customer_total(store: &Store, customer_name: &str) -> Result<Option<CustomerTotal>> {
    let id = customer_id(store, customer_name).await?;
    Ok(sqlx::query_as(CUSTOMER_TOTAL)
        .bind(id)
        .fetch_optional(store.pool())
        .await?)
}

pub async fn customer_totals(store: &Store) -> Result<Vec<CustomerTotal>> {
    Ok(sqlx::query_as(CUSTOMER_TOTALS).fetch_all(store.pool()).await?)
}

pub async fn region_totals(store: &Store) -> Result<Vec<RegionTotal>> {
    Ok(sqlx::query_as(REGION_TOTALS).fetch_all(store.pool()).await?)
}

/// Country totals rounded to whole units.
pub async fn country_totals(store: &Store) -> Result<Vec<CountryTotal>> {
    Ok(sqlx::query_as(COUNTRY_TOTALS).fetch_all(store.pool()).await?)
}

/// Countries ranked by total within their region.
pub async fn country_regional_ranks(store: &Store) -> Result<Vec<CountryRegionalRank>> {
    Ok(sqlx::query_as(COUNTRY_REGIONAL_RANKS).fetch_all(store.pool()).await?)
}

/// The rank 1 countries of every region; ties all appear.
pub async fn top_country_per_region(store: &Store) -> Result<Vec<CountryRegionalRank>> {
    Ok(sqlx::query_as(TOP_COUNTRY_PER_REGION).fetch_all(store.pool()).await?)
}

pub async fn customer_quarterly_sales(store: &Store) -> Result<Vec<QuarterlySales>> {
    let sql = format!("{} ORDER BY 2, 1, 3", CUSTOMER_SALES_BY_QUARTER);
    Ok(sqlx::query_as(&sql).fetch_all(store.pool()).await?)
}

/// The five best customers of every quarter.
pub async fn top_customers_per_quarter(store: &Store) -> Result<Vec<QuarterlyCustomerRank>> {
    let sql = format!(
        r#"
        WITH CustomerSales AS ({}),
        CustomerSalesRank AS (
            SELECT
                *,
                rank() OVER (PARTITION BY Quarter, Year ORDER BY Total DESC) AS CustomerRank
            FROM CustomerSales
        )
        SELECT * FROM CustomerSalesRank
        WHERE CustomerRank <= 5
        ORDER BY Year, Quarter, CustomerRank
        "#,
        CUSTOMER_SALES_BY_QUARTER
    );
    Ok(sqlx::query_as(&sql).fetch_all(store.pool()).await?)
}

/// Months ranked by the sum of their per-line rounded totals.
pub async fn monthly_sales_ranking(store: &Store) -> Result<Vec<MonthlySales>> {
    Ok(sqlx::query_as(MONTHLY_SALES_RANKING).fetch_all(store.pool()).await?)
}

/// Longest gap between consecutive orders of every customer.
///
/// Customers with a single order date have no gap and sort last.
pub async fn max_days_without_order(store: &Store) -> Result<Vec<OrderGap>> {
    Ok(sqlx::query_as(MAX_DAYS_WITHOUT_ORDER).fetch_all(store.pool()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use normalizer::{Error, LoadOptions};

    const EXPORT: &str = "\
Name\tAddress\tCity\tCountry\tRegion\tProductName\tProductCategory\tProductCategoryDescription\tProductUnitPrice\tQuantityOrderded\tOrderDate
Alice Smith\t1 Main St\tBerlin\tGermany\tWestern Europe\tChai;Tofu\tBeverages;Produce\tSoft drinks;Dried fruit\t18.0;23.25\t2;3\t20230101;20230215
Bob Jones\t9 Rue Lepic\tParis\tFrance\tWestern Europe\tChai\tBeverages\tDrinks\t18.0\t10\t20230320
Carla Diaz\t4 Calle Mayor\tMadrid\tSpain\tSouthern Europe\tTofu;Ikura\tProduce;Seafood\tVeg;Fish\t23.25;31.0\t1;4\t20230705;20231111
";

    async fn loaded_store() -> (tempfile::TempDir, Store) {
        store_from(EXPORT).await
    }

    async fn store_from(export: &str) -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("orders.tsv");
        std::fs::write(&data, export).unwrap();
        let store = Store::open(dir.path().join("normalized.db"), false).await.unwrap();
        normalizer::run(&store, &data, &LoadOptions::default()).await.unwrap();
        (dir, store)
    }

    // -------------------------------------------------------------------------
    // CUSTOMER TESTS
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_customer_line_items() {
        let (_dir, store) = loaded_store().await;
        let items = customer_line_items(&store, "Alice Smith").await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Alice Smith");
        assert_eq!(items[0].product_name, "Chai");
        assert_eq!(items[0].order_date, "2023-01-01");
        assert_eq!(items[0].quantity_ordered, 2);
        assert_eq!(items[0].total, 36.0);
        assert_eq!(items[1].product_name, "Tofu");
        assert_eq!(items[1].total, 69.75);
    }

    #[tokio::test]
    async fn test_customer_total() {
        let (_dir, store) = loaded_store().await;
        let total = customer_total(&store, "Carla Diaz").await.unwrap().unwrap();
        assert_eq!(total.name, "Carla Diaz");
        assert_eq!(total.total, 147.25);
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let (_dir, store) = loaded_store().await;
        let err = customer_total(&store, "Nobody Here").await.unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { dimension: Dimension::Customer, .. }));
    }

    #[tokio::test]
    async fn test_single_word_name_round_trips() {
        let export = format!(
            "{}Cher\t1 Rd\tOslo\tNorway\tNorthern Europe\tChai\tBeverages\tDrinks\t18.0\t2\t20230401\n",
            EXPORT
        );
        let (_dir, store) = store_from(&export).await;

        let totals = customer_totals(&store).await.unwrap();
        let cher = totals.iter().find(|t| t.name.starts_with("Cher")).unwrap();
        assert_eq!(cher.name, "Cher");
        assert_eq!(cher.total, 36.0);

        let items = customer_line_items(&store, &cher.name).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Cher");

        let total = customer_total(&store, "Cher").await.unwrap().unwrap();
        assert_eq!(total.name, "Cher");
    }

    #[tokio::test]
    async fn test_customer_totals_descending() {
        let (_dir, store) = loaded_store().await;
        let totals = customer_totals(&store).await.unwrap();
        let got: Vec<(&str, f64)> = totals.iter().map(|t| (t.name.as_str(), t.total)).collect();
        assert_eq!(
            got,
            vec![("Bob Jones", 180.0), ("Carla Diaz", 147.25), ("Alice Smith", 105.75)]
        );
    }

    // -------------------------------------------------------------------------
    // GEOGRAPHY TESTS
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_region_totals() {
        let (_dir, store) = loaded_store().await;
        let totals = region_totals(&store).await.unwrap();
        assert_eq!(
            totals,
            vec![
                RegionTotal { region: "Western Europe".to_string(), total: 285.75 },
                RegionTotal { region: "Southern Europe".to_string(), total: 147.25 },
            ]
        );
    }

    #[tokio::test]
    async fn test_country_totals_are_whole_units() {
        let (_dir, store) = loaded_store().await;
        let totals = country_totals(&store).await.unwrap();
        let got: Vec<(&str, f64)> = totals.iter().map(|t| (t.country.as_str(), t.country_total)).collect();
        assert_eq!(got, vec![("France", 180.0), ("Spain", 147.0), ("Germany", 106.0)]);
    }

    #[tokio::test]
    async fn test_country_regional_ranks() {
        let (_dir, store) = loaded_store().await;
        let ranks = country_regional_ranks(&store).await.unwrap();
        let got: Vec<(&str, &str, i64)> = ranks
            .iter()
            .map(|r| (r.region.as_str(), r.country.as_str(), r.country_regional_rank))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Southern Europe", "Spain", 1),
                ("Western Europe", "France", 1),
                ("Western Europe", "Germany", 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_top_country_per_region() {
        let (_dir, store) = loaded_store().await;
        let top = top_country_per_region(&store).await.unwrap();
        let got: Vec<&str> = top.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(got, vec!["Spain", "France"]);
        assert!(top.iter().all(|r| r.country_regional_rank == 1));
    }

    // -------------------------------------------------------------------------
    // CALENDAR TESTS
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_customer_quarterly_sales() {
        let (_dir, store) = loaded_store().await;
        let sales = customer_quarterly_sales(&store).await.unwrap();
        let got: Vec<(&str, i64, i64, f64)> = sales
            .iter()
            .map(|s| (s.quarter.as_str(), s.year, s.customer_id, s.total))
            .collect();
        assert_eq!(
            got,
            vec![
                ("Q1", 2023, 1, 106.0),
                ("Q1", 2023, 2, 180.0),
                ("Q3", 2023, 3, 23.0),
                ("Q4", 2023, 3, 124.0),
            ]
        );
    }

    #[tokio::test]
    async fn test_top_customers_per_quarter() {
        let (_dir, store) = loaded_store().await;
        let ranks = top_customers_per_quarter(&store).await.unwrap();
        let q1: Vec<(i64, i64)> = ranks
            .iter()
            .filter(|r| r.quarter == "Q1")
            .map(|r| (r.customer_id, r.customer_rank))
            .collect();
        assert_eq!(q1, vec![(2, 1), (1, 2)]);
        assert_eq!(ranks.len(), 4);
        assert!(ranks.iter().all(|r| r.customer_rank <= 5));
    }

    #[tokio::test]
    async fn test_monthly_sales_ranking() {
        let (_dir, store) = loaded_store().await;
        let months = monthly_sales_ranking(&store).await.unwrap();
        let got: Vec<(&str, f64, i64)> = months
            .iter()
            .map(|m| (m.month.as_str(), m.total, m.total_rank))
            .collect();
        assert_eq!(
            got,
            vec![
                ("March", 180.0, 1),
                ("November", 124.0, 2),
                ("February", 70.0, 3),
                ("January", 36.0, 4),
                ("July", 23.0, 5),
            ]
        );
    }

    #[tokio::test]
    async fn test_max_days_without_order() {
        let (_dir, store) = loaded_store().await;
        let gaps = max_days_without_order(&store).await.unwrap();
        let got: Vec<(&str, Option<f64>)> = gaps
            .iter()
            .map(|g| (g.first_name.as_str(), g.max_days_without_order))
            .collect();
        assert_eq!(
            got,
            vec![("Carla", Some(129.0)), ("Alice", Some(45.0)), ("Bob", None)]
        );
        assert_eq!(gaps[0].country, "Spain");
    }

    #[tokio::test]
    async fn test_rows_serialize_with_column_names() {
        let (_dir, store) = loaded_store().await;
        let sales = customer_quarterly_sales(&store).await.unwrap();
        let json = serde_json::to_value(&sales[0]).unwrap();
        assert_eq!(json["CustomerID"], 1);
        assert_eq!(json["Quarter"], "Q1");
    }
}
