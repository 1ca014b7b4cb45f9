//! Storage layer: SQLite pool setup, migrations, and row models.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub mod models;

/// Open a SQLite pool for either a `sqlite:` URL or a bare filesystem path.
///
/// Bare paths get their parent directory created and are normalized into a
/// `sqlite://` URL so callers can pass the configured database path verbatim.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}?mode=rwc", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}?mode=rwc", norm);
        }
    }
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        // In-memory databases vanish per-connection unless shared; keep one.
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect(&url).await?;
    Ok(pool)
}

/// Apply migrations from `crates/storage/migrations`. Idempotent.
pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
