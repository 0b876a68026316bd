use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{
    error::Result,
    record::{MigrationRecord, MigrationStatus},
};

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "pg")]
mod pg;

#[cfg(feature = "memory")]
pub use memory::*;
#[cfg(feature = "pg")]
pub use pg::*;

/// Storage backend for migration bookkeeping.
///
/// Implementations own the atomicity of `begin` and `finish`: at most one
/// record per schema may be in progress, and `finish` only ever touches the
/// record that currently is.
#[async_trait]
pub trait Engine: DynClone + Send + Sync {
    /// Idempotently create whatever the backend needs to persist records.
    async fn init(&self, schema: &str) -> Result<()>;

    /// Persist a fresh in-progress record. Fails with
    /// [`StoreError::MigrationInProgress`](crate::StoreError::MigrationInProgress)
    /// if the schema already has one, and with
    /// [`StoreError::DuplicateMigration`](crate::StoreError::DuplicateMigration)
    /// if the name already belongs to a record that was not rolled back.
    /// A rolled-back record under the same name is superseded, so a fixed
    /// migration can be retried.
    async fn begin(&self, record: MigrationRecord) -> Result<()>;

    /// Move the schema's active record to a terminal status and return it.
    async fn finish(&self, schema: &str, status: MigrationStatus) -> Result<MigrationRecord>;

    async fn active(&self, schema: &str) -> Result<Option<MigrationRecord>>;

    async fn last(&self, schema: &str) -> Result<Option<MigrationRecord>>;

    async fn history(&self, schema: &str, first: u16) -> Result<Vec<MigrationRecord>>;
}

dyn_clone::clone_trait_object!(Engine);
