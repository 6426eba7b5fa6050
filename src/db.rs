use sea_orm::{Database, DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to connect to the database: {0}")]
    Connect(#[source] DbErr),
    #[error("Statement failed: {0}")]
    Statement(#[from] DbErr),
    #[error("Database worker failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
    #[error("CSV serialization failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Opens a fresh connection, runs `op` on a blocking worker and drops the
/// connection before returning. Failures are logged under `operation`.
pub(crate) async fn with_connection<T, F>(
    db_url: &str,
    operation: &'static str,
    op: F,
) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&DatabaseConnection) -> Result<T, StoreError> + Send + 'static,
{
    let db_url = db_url.to_string();

    let result = tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
        let db = Database::connect(&db_url).map_err(StoreError::Connect)?;
        op(&db)
    })
    .await
    .map_err(StoreError::from)
    .and_then(|r| r);

    if let Err(e) = &result {
        error!(operation, "{}", e);
    }
    result
}

#[cfg(test)]
pub(crate) fn sqlite_url(path: &std::path::Path) -> String {
    format!("sqlite:{}?mode=rwc", path.display())
}
