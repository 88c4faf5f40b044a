use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use tracing::info;

/// Alias used throughout the services; kept as a plain connection so tests
/// can hand in an in-memory SQLite database.
pub type DbPool = DatabaseConnection;

/// Establishes a database connection pool from a connection URL.
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    let mut opts = ConnectOptions::new(database_url.to_string());
    opts.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    let db = Database::connect(opts).await?;
    info!("Database connection established");
    Ok(db)
}
