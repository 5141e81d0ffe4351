use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::path::Path;

pub async fn init_db(db_path: &str) -> anyhow::Result<DatabaseConnection> {
    let abs_path = std::fs::canonicalize(db_path)
        .unwrap_or_else(|_| std::path::PathBuf::from(db_path));
    tracing::info!("Database absolute path: {:?}", abs_path);

    // Ensure parent directory exists
    if let Some(parent) = Path::new(db_path).parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let url = format!("sqlite:{}?mode=rwc", db_path);
    let db = connect(&url, 5).await?;

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn connect(url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.max_connections(max_connections)
        .min_connections(1)
        .sqlx_logging(false);
    Database::connect(opt).await
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    if let Err(e) = sqlx::migrate!("./migrations")
        .run(db.get_sqlite_connection_pool())
        .await
    {
        tracing::error!("Database migration failed: {}", e);
        return Err(e.into());
    }

    tracing::info!("Database migrations applied successfully");
    Ok(())
}

/// Fresh in-memory store with the real schema applied.
#[cfg(test)]
pub async fn memory_db() -> DatabaseConnection {
    // A single connection keeps every query on the same in-memory database.
    let db = connect("sqlite::memory:", 1).await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}
