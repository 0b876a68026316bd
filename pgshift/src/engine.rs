use async_trait::async_trait;
use dyn_clone::DynClone;
use pgshift_store::MigrationRecord;
use serde::{Deserialize, Serialize};

use crate::{error::Result, migration::Migration};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;

/// Point-in-time view of one schema's migration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaStatus {
    pub schema: String,
    pub active: Option<MigrationRecord>,
    pub last: Option<MigrationRecord>,
}

/// Lifecycle backend bound to one target schema.
///
/// Implementations enforce the single-in-progress invariant through their
/// state store; callers see the same contract whether the backend is
/// Postgres or the in-process model.
#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    /// Idempotently set up the state store and the target schema.
    async fn init(&self) -> Result<()>;

    /// Record the migration, apply its expand phase and run backfills.
    async fn start(&self, migration: &Migration) -> Result<()>;

    /// Apply the contract phase of the active migration and finalize it.
    async fn complete(&self) -> Result<MigrationRecord>;

    /// Revert the expand phase of the active migration.
    async fn rollback(&self) -> Result<MigrationRecord>;

    async fn status(&self) -> Result<SchemaStatus>;

    /// Release underlying connections. Sessions call this on every exit
    /// path.
    async fn close(&self) -> Result<()>;
}

dyn_clone::clone_trait_object!(Engine);
