//! SQLite-backed key-value store (durable offline persistence).

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::runtime::Runtime;

use crate::store::{KeyValueStore, StoreError};

/// Durable [`KeyValueStore`] over a single SQLite table.
///
/// The port is synchronous, so every call blocks on a private runtime. Do not
/// call it from inside an async context.
#[derive(Debug)]
pub struct SqliteStore {
    rt: Runtime,
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create offline store directory at {:?}", parent))?;
        }

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to create runtime for SqliteStore")?;

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);

        let pool = rt.block_on(async {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .with_context(|| format!("failed to create SQLite pool for SqliteStore at {:?}", path))?;

            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS kv (
                    key         TEXT PRIMARY KEY,
                    value       TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                )
                "#,
            )
            .execute(&pool)
            .await
            .context("failed to create kv table")?;

            Ok::<_, anyhow::Error>(pool)
        })?;

        tracing::info!("opened offline store at {:?}", path);
        Ok(Self { rt, pool, path })
    }

    /// Open the store at `{app_data_dir}/fieldguard/offline.db`.
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(default_db_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let result: anyhow::Result<Option<String>> = self.rt.block_on(async {
            let row = sqlx::query(
                r#"
                SELECT value
                FROM kv
                WHERE key = ?1
                "#,
            )
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("failed to read key from offline store")?;

            match row {
                Some(row) => Ok(Some(row.try_get("value")?)),
                None => Ok(None),
            }
        });

        result.map_err(backend)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        self.rt
            .block_on(async {
                sqlx::query(
                    r#"
                    INSERT INTO kv (key, value, updated_at)
                    VALUES (?1, ?2, ?3)
                    ON CONFLICT(key)
                    DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(key)
                .bind(value)
                .bind(&now)
                .execute(&self.pool)
                .await
                .context("failed to upsert key in offline store")?;

                Ok::<(), anyhow::Error>(())
            })
            .map_err(backend)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.rt
            .block_on(async {
                sqlx::query(
                    r#"
                    DELETE FROM kv
                    WHERE key = ?1
                    "#,
                )
                .bind(key)
                .execute(&self.pool)
                .await
                .context("failed to delete key from offline store")?;

                Ok::<(), anyhow::Error>(())
            })
            .map_err(backend)
    }
}

fn backend(err: anyhow::Error) -> StoreError {
    tracing::error!("offline store error: {err:?}");
    StoreError::Backend(format!("{err:#}"))
}

/// Resolve the default database path:
/// `{app_data_dir}/fieldguard/offline.db`.
pub fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|mut h| {
            h.push(".local");
            h.push("share");
            h
        }))
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("fieldguard");
    dir.push("offline.db");

    Ok(dir)
}
