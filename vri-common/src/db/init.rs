//! Database initialization
//!
//! Opens (or creates) the shared SQLite database and creates the review and
//! venue tables. Every statement is idempotent, so initialization is safe to
//! repeat on each start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pipeline workers write concurrently, one connection each
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create the venues and reviews tables
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_venues_table(pool).await?;
    create_reviews_table(pool).await?;

    info!("Database tables initialized (venues, reviews)");
    Ok(())
}

/// Create the venues table
///
/// `ai_*` columns are written only by the summarization stage.
pub async fn create_venues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            ai_summary TEXT,
            ai_key_points TEXT,
            ai_global_score TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the reviews table
///
/// `ai_clusters` holds a JSON array of `{label, score}` objects.
pub async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id TEXT PRIMARY KEY,
            venue_id TEXT NOT NULL,
            text TEXT,
            ai_sentiment TEXT,
            ai_confidence_score REAL,
            ai_clusters TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_venue_id ON reviews(venue_id)")
        .execute(pool)
        .await?;

    Ok(())
}
