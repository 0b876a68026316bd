use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;
use pgshift_store::{MigrationRecord, StateStore};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    engine::{Engine, SchemaStatus},
    error::Result,
    migration::Migration,
    operation::{Column, Operation},
    session::Session,
};

/// Structural model of a table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDef {
    pub columns: Vec<Column>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Structural model of a schema: table name to definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDef {
    pub tables: BTreeMap<String, TableDef>,
}

impl SchemaDef {
    /// Apply one operation's logical effect. Additions become visible,
    /// removals disappear; on the staged copy this models the expand view,
    /// and promotion at complete turns it into the final schema.
    fn apply(&mut self, operation: &Operation) -> Result<()> {
        match operation {
            Operation::CreateTable(op) => {
                if self.tables.contains_key(&op.name) {
                    return Err(anyhow!("relation `{}` already exists", op.name).into());
                }

                self.tables.insert(
                    op.name.clone(),
                    TableDef {
                        columns: op.columns.clone(),
                    },
                );
            }
            Operation::DropTable(op) => {
                if self.tables.remove(&op.name).is_none() {
                    return Err(anyhow!("relation `{}` does not exist", op.name).into());
                }
            }
            Operation::AddColumn(op) => {
                let table = self
                    .tables
                    .get_mut(&op.table)
                    .ok_or_else(|| anyhow!("relation `{}` does not exist", op.table))?;

                if table.column(&op.column.name).is_some() {
                    return Err(anyhow!(
                        "column `{}` of relation `{}` already exists",
                        op.column.name,
                        op.table
                    )
                    .into());
                }

                table.columns.push(op.column.clone());
            }
            Operation::DropColumn(op) => {
                let table = self
                    .tables
                    .get_mut(&op.table)
                    .ok_or_else(|| anyhow!("relation `{}` does not exist", op.table))?;

                let before = table.columns.len();
                table.columns.retain(|c| c.name != op.column);

                if table.columns.len() == before {
                    return Err(anyhow!(
                        "column `{}` of relation `{}` does not exist",
                        op.column,
                        op.table
                    )
                    .into());
                }
            }
            // No structural footprint to model.
            Operation::RawSql(_) => {}
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    committed: SchemaDef,
    staged: Option<SchemaDef>,
}

/// In-process lifecycle backend: the committed schema plus an optional
/// staged copy that plays the role of the expand-phase view.
#[derive(Clone)]
pub struct MemoryEngine {
    schema: String,
    store: StateStore,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryEngine {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            store: pgshift_store::Memory::new(),
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    pub fn session(schema: impl Into<String>) -> Session {
        Session::new(Self::new(schema))
    }

    /// The finalized schema, as consumers outside a migration see it.
    pub fn committed(&self) -> SchemaDef {
        self.state.read().committed.clone()
    }

    /// What callers on the expand-phase view see: the staged schema while a
    /// migration is in progress, the committed one otherwise.
    pub fn view(&self) -> SchemaDef {
        let state = self.state.read();

        state.staged.clone().unwrap_or_else(|| state.committed.clone())
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn init(&self) -> Result<()> {
        self.store.init(&self.schema).await?;

        Ok(())
    }

    async fn start(&self, migration: &Migration) -> Result<()> {
        migration.validate()?;

        // Claims the single in-progress slot; fails atomically if another
        // migration is active or the name was already used.
        self.store
            .begin(&self.schema, &migration.name, migration.operations_value()?)
            .await?;

        let mut staged = self.state.read().committed.clone();

        for operation in &migration.operations {
            if let Err(err) = staged.apply(operation) {
                self.store.rollback(&self.schema).await?;

                return Err(err);
            }
        }

        self.state.write().staged = Some(staged);

        tracing::info!(schema = %self.schema, name = %migration.name, "migration started");

        Ok(())
    }

    async fn complete(&self) -> Result<MigrationRecord> {
        let record = self.store.complete(&self.schema).await?;

        let mut state = self.state.write();
        if let Some(staged) = state.staged.take() {
            state.committed = staged;
        }

        tracing::info!(schema = %self.schema, name = %record.name, "migration completed");

        Ok(record)
    }

    async fn rollback(&self) -> Result<MigrationRecord> {
        let record = self.store.rollback(&self.schema).await?;

        self.state.write().staged = None;

        tracing::info!(schema = %self.schema, name = %record.name, "migration rolled back");

        Ok(record)
    }

    async fn status(&self) -> Result<SchemaStatus> {
        Ok(SchemaStatus {
            schema: self.schema.clone(),
            active: self.store.active(&self.schema).await?,
            last: self.store.last(&self.schema).await?,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
