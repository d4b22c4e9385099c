use std::{future::Future, path::Path, time::Duration};

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr, SqlErr};
use tracing::info;

use crate::config::Config;

/// Budget for create/list handlers and the summary report.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(3);
/// Budget for the campaign attribution report and its export.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SQLite (local) or PostgreSQL and applies pending migrations.
pub async fn connect(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let url = if config.is_local() {
        sqlite_url(&config.sqlite_path)?
    } else {
        config.pg_dsn.clone()
    };

    info!(
        "Connecting to database: {}",
        if config.is_local() { "SQLite (local)" } else { "PostgreSQL" }
    );
    connect_url(&url).await
}

pub async fn connect_url(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options.sqlx_logging(false);
    // Every pooled connection to `:memory:` would otherwise see its own empty database.
    if url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }

    let db = Database::connect(options).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

fn sqlite_url(path: &str) -> Result<String, DbErr> {
    if path == ":memory:" {
        return Ok("sqlite::memory:".to_string());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbErr::Custom(format!("create sqlite directory {}: {e}", parent.display()))
            })?;
        }
    }
    Ok(format!("sqlite://{path}?mode=rwc"))
}

/// Runs a store future under a deadline; an expired deadline drops the
/// in-flight query and surfaces as an ordinary `DbErr`.
pub async fn timed<T, F>(limit: Duration, fut: F) -> Result<T, DbErr>
where
    F: Future<Output = Result<T, DbErr>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| DbErr::Custom(format!("query exceeded {}ms", limit.as_millis())))?
}

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
