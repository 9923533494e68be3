use std::{
    ops::{Deref, DerefMut},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqlitePool,
};

use crate::{config::AppConfig, error::ApiError};

pub async fn connect(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    connect_url(&config.database_url, config.max_connections).await
}

/// Opens (creating if needed) a WAL-mode database; writers queue on the
/// busy timeout instead of failing straight away.
pub async fn connect_url(url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("parse database url `{url}`"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// One pooled connection for the lifetime of a request. Dropping it hands
/// the connection back to the pool, whatever path the handler took.
/// Handlers acquire it after auth and payload checks have passed.
pub struct DbConn(pub PoolConnection<Sqlite>);

impl DbConn {
    pub async fn acquire(db: &SqlitePool) -> Result<Self, ApiError> {
        Ok(DbConn(db.acquire().await?))
    }
}

impl Deref for DbConn {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConn {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
