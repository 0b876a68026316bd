#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("migration `{0}` is already in progress")]
    MigrationInProgress(String),

    #[error("no migration in progress")]
    NoActiveMigration,

    #[error("migration `{0}` was already submitted")]
    DuplicateMigration(String),

    #[error("unknown migration status `{0}`")]
    UnknownStatus(String),

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
