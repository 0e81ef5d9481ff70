//! SQLite database layer

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

/// Initialize the database connection pool
pub async fn init(database_url: &str) -> anyhow::Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        if let Some(path) = path.split('?').next() {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    // Enable WAL mode for better concurrent performance
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    migrate(&pool).await?;

    info!("Database ready at {}", database_url);
    Ok(pool)
}

/// Run the embedded migrations
pub async fn migrate(pool: &SqlitePool) -> crate::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test pool");

    migrate(&pool).await.expect("Failed to run migrations");

    pool
}
