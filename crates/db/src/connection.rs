use std::str::FromStr;
use std::time::Duration;

use concierge_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(normalize_url(database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let mut pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));

    // An in-memory database lives only as long as one of its connections.
    if is_in_memory(database_url) {
        pool = pool.min_connections(1).idle_timeout(None).max_lifetime(None);
    }

    pool.connect_with(options).await
}

fn is_in_memory(database_url: &str) -> bool {
    let url = normalize_url(database_url);
    url.starts_with("sqlite::memory:") || url.contains("mode=memory")
}

fn normalize_url(database_url: &str) -> &str {
    match database_url.trim() {
        ":memory:" => "sqlite::memory:",
        other => other,
    }
}
