use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::{
    engine::Engine,
    error::{Result, StoreError},
    record::{MigrationRecord, MigrationStatus},
    store::StateStore,
};

/// In-memory bookkeeping, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct Memory(Arc<RwLock<Vec<MigrationRecord>>>);

impl Memory {
    pub fn new() -> StateStore {
        StateStore::new(Self::default())
    }
}

#[async_trait]
impl Engine for Memory {
    async fn init(&self, _schema: &str) -> Result<()> {
        Ok(())
    }

    async fn begin(&self, record: MigrationRecord) -> Result<()> {
        let mut records = self.0.write();

        if let Some(active) = records
            .iter()
            .find(|r| r.schema == record.schema && r.status == MigrationStatus::InProgress)
        {
            return Err(StoreError::MigrationInProgress(active.name.to_owned()));
        }

        if records.iter().any(|r| {
            r.schema == record.schema
                && r.name == record.name
                && r.status != MigrationStatus::RolledBack
        }) {
            return Err(StoreError::DuplicateMigration(record.name));
        }

        // A resubmitted migration supersedes its rolled-back record, so a
        // fixed migration can be retried under the same name.
        records.retain(|r| !(r.schema == record.schema && r.name == record.name));
        records.push(record);

        Ok(())
    }

    async fn finish(&self, schema: &str, status: MigrationStatus) -> Result<MigrationRecord> {
        let mut records = self.0.write();

        let record = records
            .iter_mut()
            .find(|r| r.schema == schema && r.status == MigrationStatus::InProgress)
            .ok_or(StoreError::NoActiveMigration)?;

        record.status = status;
        record.finished_at = Some(Utc::now());

        Ok(record.clone())
    }

    async fn active(&self, schema: &str) -> Result<Option<MigrationRecord>> {
        let records = self.0.read();

        Ok(records
            .iter()
            .find(|r| r.schema == schema && r.status == MigrationStatus::InProgress)
            .cloned())
    }

    async fn last(&self, schema: &str) -> Result<Option<MigrationRecord>> {
        let records = self.0.read();

        Ok(records
            .iter()
            .filter(|r| r.schema == schema)
            .max_by(|a, b| a.name.cmp(&b.name))
            .cloned())
    }

    async fn history(&self, schema: &str, first: u16) -> Result<Vec<MigrationRecord>> {
        let records = self.0.read();

        let mut history = records
            .iter()
            .filter(|r| r.schema == schema)
            .cloned()
            .collect::<Vec<_>>();

        history.sort_by(|a, b| a.name.cmp(&b.name));
        history.truncate(usize::from(first));

        Ok(history)
    }
}
