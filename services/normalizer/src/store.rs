//! The normalized store: a single SQLite file behind a one-connection pool.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
}

impl Store {
    /// Opens (creating if missing) the store at `path` for loading.
    ///
    /// With `delete_existing` the file is removed first, so the run starts
    /// from an empty schema.
    pub async fn open(path: impl AsRef<Path>, delete_existing: bool) -> Result<Self> {
        let path = path.as_ref();

        if delete_existing {
            let io_error = |source: std::io::Error| Error::Io {
                path: path.to_path_buf(),
                source,
            };
            if tokio::fs::try_exists(path).await.map_err(io_error)? {
                tokio::fs::remove_file(path).await.map_err(io_error)?;
                info!(path = %path.display(), "deleted existing store");
            }
        }

        let options = Self::options(path).create_if_missing(true);
        Self::connect(path, options).await
    }

    /// Opens an existing store without write access.
    pub async fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::options(path).read_only(true);
        Self::connect(path, options).await
    }

    fn options(path: &Path) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(path)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Delete)
    }

    async fn connect(path: &Path, options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "store opened");
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
                .bind(table)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normalized.db");

        let store = Store::open(&path, false).await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path.as_path());
        store.close().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("fk.db"), false).await.unwrap();

        let (enabled,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn test_delete_existing_discards_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normalized.db");

        let store = Store::open(&path, false).await.unwrap();
        sqlx::query("CREATE TABLE Scratch (id INTEGER PRIMARY KEY)")
            .execute(store.pool())
            .await
            .unwrap();
        assert!(store.table_exists("Scratch").await.unwrap());
        store.close().await;

        let reopened = Store::open(&path, false).await.unwrap();
        assert!(reopened.table_exists("Scratch").await.unwrap());
        reopened.close().await;

        let fresh = Store::open(&path, true).await.unwrap();
        assert!(!fresh.table_exists("Scratch").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_existing_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain.txt");
        std::fs::write(&not_a_dir, "x").unwrap();
        let path = not_a_dir.join("normalized.db");

        match Store::open(&path, true).await.unwrap_err() {
            Error::Io { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro.db");
        Store::open(&path, false).await.unwrap().close().await;

        let store = Store::open_read_only(&path).await.unwrap();
        let result = sqlx::query("CREATE TABLE Scratch (id INTEGER PRIMARY KEY)")
            .execute(store.pool())
            .await;
        assert!(result.is_err());
    }
}
