use serde_json::Value;

use crate::{
    engine::Engine,
    error::Result,
    record::{MigrationRecord, MigrationStatus},
};

/// Façade over a bookkeeping [`Engine`].
#[derive(Clone)]
pub struct StateStore {
    pub(crate) engine: Box<dyn Engine>,
}

impl StateStore {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub async fn init(&self, schema: &str) -> Result<()> {
        self.engine.init(schema).await
    }

    /// Record a migration as started for `schema`.
    pub async fn begin(
        &self,
        schema: &str,
        name: impl Into<String>,
        operations: Value,
    ) -> Result<MigrationRecord> {
        let record = MigrationRecord::started(schema, name, operations);
        self.engine.begin(record.clone()).await?;

        Ok(record)
    }

    pub async fn complete(&self, schema: &str) -> Result<MigrationRecord> {
        self.engine.finish(schema, MigrationStatus::Completed).await
    }

    pub async fn rollback(&self, schema: &str) -> Result<MigrationRecord> {
        self.engine
            .finish(schema, MigrationStatus::RolledBack)
            .await
    }

    pub async fn active(&self, schema: &str) -> Result<Option<MigrationRecord>> {
        self.engine.active(schema).await
    }

    pub async fn last(&self, schema: &str) -> Result<Option<MigrationRecord>> {
        self.engine.last(schema).await
    }

    pub async fn history(&self, schema: &str, first: u16) -> Result<Vec<MigrationRecord>> {
        self.engine.history(schema, first).await
    }
}
