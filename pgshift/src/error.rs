#[derive(Debug, thiserror::Error)]
pub enum ShiftError {
    /// The submitted migration failed structural validation before any
    /// engine work happened. Maps to a client error at the HTTP layer.
    #[error("invalid migration: {0}")]
    InvalidMigration(String),

    #[error("store `{0}`")]
    Store(#[from] pgshift_store::StoreError),

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("serde_json `{0}`")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ShiftError>;
