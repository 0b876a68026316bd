use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StoreError};

/// Lifecycle status of a submitted migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    InProgress,
    Completed,
    RolledBack,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::str::FromStr for MigrationStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "rolled_back" => Ok(Self::RolledBack),
            _ => Err(StoreError::UnknownStatus(value.to_owned())),
        }
    }
}

/// Persisted bookkeeping row for one migration of one schema.
///
/// The operation list is kept as the raw JSON payload the caller submitted.
/// Callers that need the typed form go through [`MigrationRecord::to_operations`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MigrationRecord {
    pub schema: String,
    pub name: String,
    pub operations: Value,
    pub status: MigrationStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl MigrationRecord {
    pub fn started(
        schema: impl Into<String>,
        name: impl Into<String>,
        operations: Value,
    ) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            operations,
            status: MigrationStatus::InProgress,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn to_operations<D: DeserializeOwned>(&self) -> Result<D> {
        Ok(serde_json::from_value(self.operations.clone())?)
    }
}
