//! Table declarations of the normalized schema.

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub ddl: &'static str,
}

pub const REGION: TableDef = TableDef {
    name: "Region",
    ddl: r#"
        CREATE TABLE Region (
            RegionID INTEGER NOT NULL PRIMARY KEY,
            Region TEXT NOT NULL UNIQUE
        )
    "#,
};

pub const COUNTRY: TableDef = TableDef {
    name: "Country",
    ddl: r#"
        CREATE TABLE Country (
            CountryID INTEGER NOT NULL PRIMARY KEY,
            Country TEXT NOT NULL UNIQUE,
            RegionID INTEGER NOT NULL,
            FOREIGN KEY (RegionID) REFERENCES Region (RegionID)
        )
    "#,
};

pub const CUSTOMER: TableDef = TableDef {
    name: "Customer",
    ddl: r#"
        CREATE TABLE Customer (
            CustomerID INTEGER NOT NULL PRIMARY KEY,
            FirstName TEXT NOT NULL,
            LastName TEXT NOT NULL,
            Address TEXT NOT NULL,
            City TEXT NOT NULL,
            CountryID INTEGER NOT NULL,
            FOREIGN KEY (CountryID) REFERENCES Country (CountryID)
        )
    "#,
};

pub const PRODUCT_CATEGORY: TableDef = TableDef {
    name: "ProductCategory",
    ddl: r#"
        CREATE TABLE ProductCategory (
            ProductCategoryID INTEGER NOT NULL PRIMARY KEY,
            ProductCategory TEXT NOT NULL UNIQUE,
            ProductCategoryDescription TEXT NOT NULL
        )
    "#,
};

pub const PRODUCT: TableDef = TableDef {
    name: "Product",
    ddl: r#"
        CREATE TABLE Product (
            ProductID INTEGER NOT NULL PRIMARY KEY,
            ProductName TEXT NOT NULL UNIQUE,
            ProductUnitPrice REAL NOT NULL CHECK (ProductUnitPrice >= 0),
            ProductCategoryID INTEGER NOT NULL,
            FOREIGN KEY (ProductCategoryID) REFERENCES ProductCategory (ProductCategoryID)
        )
    "#,
};

pub const ORDER_DETAIL: TableDef = TableDef {
    name: "OrderDetail",
    ddl: r#"
        CREATE TABLE OrderDetail (
            OrderID INTEGER NOT NULL PRIMARY KEY,
            CustomerID INTEGER NOT NULL,
            ProductID INTEGER NOT NULL,
            OrderDate TEXT NOT NULL,
            QuantityOrdered INTEGER NOT NULL CHECK (QuantityOrdered >= 1),
            FOREIGN KEY (CustomerID) REFERENCES Customer (CustomerID),
            FOREIGN KEY (ProductID) REFERENCES Product (ProductID)
        )
    "#,
};

/// Every table, parents before children.
pub const ALL: [TableDef; 6] = [REGION, COUNTRY, CUSTOMER, PRODUCT_CATEGORY, PRODUCT, ORDER_DETAIL];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    IfAbsent,
    DropAndRecreate,
}

/// Outcome of a table creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Created,
    AlreadyExists,
    Recreated,
}

/// Creates `table`. An existing table is reported, not treated as a failure.
///
/// `DropAndRecreate` drops the table first; with foreign keys enforced the
/// drop fails while child rows still reference it, see [`drop_all`].
pub async fn create_table(store: &Store, table: &TableDef, mode: CreateMode) -> Result<TableStatus> {
    let existed = store.table_exists(table.name).await?;

    let status = match (mode, existed) {
        (CreateMode::IfAbsent, true) => {
            info!(table = table.name, "table already exists; keeping it");
            return Ok(TableStatus::AlreadyExists);
        }
        (CreateMode::IfAbsent, false) => TableStatus::Created,
        (CreateMode::DropAndRecreate, _) => {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.name))
                .execute(store.pool())
                .await?;
            if existed {
                TableStatus::Recreated
            } else {
                TableStatus::Created
            }
        }
    };

    sqlx::query(table.ddl).execute(store.pool()).await?;
    info!(table = table.name, ?status, "table ready");
    Ok(status)
}

/// Drops every table, children first.
pub async fn drop_all(store: &Store) -> Result<()> {
    for table in ALL.iter().rev() {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.name))
            .execute(store.pool())
            .await?;
    }
    info!("dropped all tables");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("schema.db"), false).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_create_then_already_exists() {
        let (_dir, store) = scratch_store().await;

        let first = create_table(&store, &REGION, CreateMode::IfAbsent).await.unwrap();
        let second = create_table(&store, &REGION, CreateMode::IfAbsent).await.unwrap();

        assert_eq!(first, TableStatus::Created);
        assert_eq!(second, TableStatus::AlreadyExists);
    }

    #[tokio::test]
    async fn test_drop_and_recreate_empties_table() {
        let (_dir, store) = scratch_store().await;
        create_table(&store, &REGION, CreateMode::IfAbsent).await.unwrap();
        sqlx::query("INSERT INTO Region (Region) VALUES ('Asia')")
            .execute(store.pool())
            .await
            .unwrap();

        let status = create_table(&store, &REGION, CreateMode::DropAndRecreate).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM Region")
            .fetch_one(store.pool())
            .await
            .unwrap();

        assert_eq!(status, TableStatus::Recreated);
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_foreign_key_rejects_unknown_parent() {
        let (_dir, store) = scratch_store().await;
        create_table(&store, &REGION, CreateMode::IfAbsent).await.unwrap();
        create_table(&store, &COUNTRY, CreateMode::IfAbsent).await.unwrap();

        let result = sqlx::query("INSERT INTO Country (Country, RegionID) VALUES ('Chile', 42)")
            .execute(store.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_drop_all_removes_every_table() {
        let (_dir, store) = scratch_store().await;
        for table in &ALL {
            create_table(&store, table, CreateMode::IfAbsent).await.unwrap();
        }

        drop_all(&store).await.unwrap();

        for table in &ALL {
            assert!(!store.table_exists(table.name).await.unwrap(), "{} still exists", table.name);
        }
    }
}
