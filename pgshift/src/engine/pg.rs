use async_trait::async_trait;
use pgshift_store::{MigrationRecord, MigrationStatus, StateStore, StoreError};
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;

use crate::{
    engine::{Engine, SchemaStatus},
    error::Result,
    migration::Migration,
    operation::{quote_ident, Operation},
};

/// Rows touched per backfill statement before re-checking for remaining
/// work.
const BACKFILL_BATCH_SIZE: u64 = 1000;

/// Postgres lifecycle backend: expand/contract DDL against the target
/// schema, a versioned view schema for the expand phase, and batched
/// backfills, with bookkeeping in the pgshift state schema.
#[derive(Clone)]
pub struct PgEngine {
    pool: PgPool,
    schema: String,
    store: StateStore,
}

impl PgEngine {
    pub fn new(pool: &PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool: pool.clone(),
            schema: schema.into(),
            store: pgshift_store::PgStore::new(pool),
        }
    }

    fn view_schema(&self, migration_name: &str) -> String {
        format!("{}_{}", self.schema, migration_name)
    }

    /// Build the expand view schema: one view per touched table, omitting
    /// tables and columns scheduled for removal and exposing fresh ones.
    /// Runs inside the expand transaction so it sees the new DDL.
    async fn create_views(&self, conn: &mut PgConnection, migration: &Migration) -> Result<()> {
        let view_schema = self.view_schema(&migration.name);

        sqlx::query(&format!("CREATE SCHEMA {}", quote_ident(&view_schema)))
            .execute(&mut *conn)
            .await?;

        let dropped_tables: HashSet<&str> = migration
            .operations
            .iter()
            .filter_map(Operation::drops_table)
            .collect();

        let dropped_columns: HashSet<(&str, &str)> = migration
            .operations
            .iter()
            .filter_map(Operation::drops_column)
            .collect();

        let mut tables: Vec<&str> = Vec::new();
        for operation in &migration.operations {
            if let Some(table) = operation.table() {
                if !tables.contains(&table) {
                    tables.push(table);
                }
            }
        }

        for table in tables {
            if dropped_tables.contains(table) {
                continue;
            }

            let columns: Vec<(String,)> = sqlx::query_as(
                r#"
                SELECT column_name::text FROM information_schema.columns
                WHERE table_schema = $1 AND table_name = $2
                ORDER BY ordinal_position
                "#,
            )
            .bind(&self.schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

            let visible = columns
                .iter()
                .filter(|(name,)| !dropped_columns.contains(&(table, name.as_str())))
                .map(|(name,)| quote_ident(name))
                .collect::<Vec<_>>()
                .join(", ");

            if visible.is_empty() {
                continue;
            }

            sqlx::query(&format!(
                "CREATE VIEW {}.{} AS SELECT {visible} FROM {}.{}",
                quote_ident(&view_schema),
                quote_ident(table),
                quote_ident(&self.schema),
                quote_ident(table)
            ))
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn run_backfills(&self, conn: &mut PgConnection, migration: &Migration) -> Result<()> {
        for backfill in migration.operations.iter().filter_map(Operation::backfill) {
            let table = format!(
                "{}.{}",
                quote_ident(&self.schema),
                quote_ident(&backfill.table)
            );
            let column = quote_ident(&backfill.column);

            let sql = format!(
                r#"
                UPDATE {table} SET {column} = {expression}
                WHERE ctid IN (
                    SELECT ctid FROM {table}
                    WHERE {column} IS NULL
                    LIMIT {BACKFILL_BATCH_SIZE}
                )
                "#,
                expression = backfill.expression,
            );

            loop {
                let affected = sqlx::query(&sql).execute(&mut *conn).await?.rows_affected();

                tracing::debug!(
                    table = %backfill.table,
                    column = %backfill.column,
                    rows = affected,
                    "backfill batch"
                );

                if affected == 0 {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn drop_view_schema(&self, conn: &mut PgConnection, migration_name: &str) -> Result<()> {
        sqlx::query(&format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            quote_ident(&self.view_schema(migration_name))
        ))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

}

async fn execute_all(conn: &mut PgConnection, statements: &[String]) -> Result<()> {
    for sql in statements {
        tracing::debug!(%sql, "executing");
        sqlx::query(sql).execute(&mut *conn).await?;
    }

    Ok(())
}

#[async_trait]
impl Engine for PgEngine {
    async fn init(&self) -> Result<()> {
        self.store.init(&self.schema).await?;

        sqlx::query(&format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            quote_ident(&self.schema)
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn start(&self, migration: &Migration) -> Result<()> {
        migration.validate()?;

        // Claims the single in-progress slot under the schema's advisory
        // lock; a concurrent start loses here and no DDL runs.
        self.store
            .begin(&self.schema, &migration.name, migration.operations_value()?)
            .await?;

        let expand = async {
            let mut tx = self.pool.begin().await?;

            for operation in &migration.operations {
                execute_all(&mut *tx, &operation.expand_sql(&self.schema)).await?;
            }

            self.create_views(&mut *tx, migration).await?;

            // Inside the expand transaction: a backfill failure aborts the
            // start as one unit.
            self.run_backfills(&mut *tx, migration).await?;

            tx.commit().await?;

            Ok(())
        };

        if let Err(err) = expand.await {
            if let Err(store_err) = self.store.rollback(&self.schema).await {
                tracing::warn!(
                    schema = %self.schema,
                    name = %migration.name,
                    error = %store_err,
                    "failed to mark aborted migration as rolled back"
                );
            }

            return Err(err);
        }

        tracing::info!(schema = %self.schema, name = %migration.name, "migration started");

        Ok(())
    }

    async fn complete(&self) -> Result<MigrationRecord> {
        // Contract DDL and the status flip commit as one unit under the
        // schema's advisory lock, so a concurrent complete or rollback
        // waits here and then finds no active record.
        let mut tx = self.pool.begin().await?;

        pgshift_store::lock_schema(&mut tx, &self.schema).await?;

        let record = pgshift_store::fetch_active(&mut tx, &self.schema)
            .await?
            .ok_or(StoreError::NoActiveMigration)?;
        let operations: Vec<Operation> = record.to_operations()?;

        for operation in &operations {
            execute_all(&mut *tx, &operation.contract_sql(&self.schema)).await?;
        }

        self.drop_view_schema(&mut *tx, &record.name).await?;

        let record =
            pgshift_store::finish_active(&mut tx, &self.schema, MigrationStatus::Completed)
                .await?;

        tx.commit().await?;

        tracing::info!(schema = %self.schema, name = %record.name, "migration completed");

        Ok(record)
    }

    async fn rollback(&self) -> Result<MigrationRecord> {
        let mut tx = self.pool.begin().await?;

        pgshift_store::lock_schema(&mut tx, &self.schema).await?;

        let record = pgshift_store::fetch_active(&mut tx, &self.schema)
            .await?
            .ok_or(StoreError::NoActiveMigration)?;
        let operations: Vec<Operation> = record.to_operations()?;

        for operation in operations.iter().rev() {
            execute_all(&mut *tx, &operation.revert_sql(&self.schema)).await?;
        }

        self.drop_view_schema(&mut *tx, &record.name).await?;

        let record =
            pgshift_store::finish_active(&mut tx, &self.schema, MigrationStatus::RolledBack)
                .await?;

        tx.commit().await?;

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
        self.pool.close().await;

        Ok(())
    }
}
