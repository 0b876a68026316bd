use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::{
    engine::Engine,
    error::{Result, StoreError},
    record::{MigrationRecord, MigrationStatus},
    store::StateStore,
};

/// Schema that holds pgshift's own bookkeeping, kept apart from any schema
/// under migration.
pub const STATE_SCHEMA: &str = "pgshift";

const MIGRATIONS_TABLE: &str = "pgshift.migrations";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: &PgPool) -> StateStore {
        StateStore::new(Self { pool: pool.clone() })
    }
}

#[derive(sqlx::FromRow)]
struct MigrationRow {
    schema_name: String,
    name: String,
    operations: Value,
    status: String,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<MigrationRow> for MigrationRecord {
    type Error = StoreError;

    fn try_from(row: MigrationRow) -> Result<Self> {
        Ok(Self {
            schema: row.schema_name,
            name: row.name,
            operations: row.operations,
            status: row.status.parse()?,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

/// Takes the schema's advisory lock for the rest of the current
/// transaction, serializing lifecycle transitions per schema.
pub async fn lock_schema(conn: &mut sqlx::PgConnection, schema: &str) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(schema)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Fetches the in-progress record for the schema, locking its row for the
/// rest of the current transaction.
pub async fn fetch_active(
    conn: &mut sqlx::PgConnection,
    schema: &str,
) -> Result<Option<MigrationRecord>> {
    let row: Option<MigrationRow> = sqlx::query_as(&format!(
        "SELECT * FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 AND status = $2 FOR UPDATE"
    ))
    .bind(schema)
    .bind(MigrationStatus::InProgress.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Moves the in-progress record to `status` within the current transaction,
/// so callers can flip the status in the same transaction as their DDL.
pub async fn finish_active(
    conn: &mut sqlx::PgConnection,
    schema: &str,
    status: MigrationStatus,
) -> Result<MigrationRecord> {
    let row: Option<MigrationRow> = sqlx::query_as(&format!(
        r#"
        UPDATE {MIGRATIONS_TABLE}
        SET status = $1, finished_at = now()
        WHERE schema_name = $2 AND status = $3
        RETURNING *
        "#
    ))
    .bind(status.as_str())
    .bind(schema)
    .bind(MigrationStatus::InProgress.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or(StoreError::NoActiveMigration)?.try_into()
}

#[async_trait]
impl Engine for PgStore {
    async fn init(&self, _schema: &str) -> Result<()> {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {STATE_SCHEMA}"))
            .execute(&self.pool)
            .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                schema_name text NOT NULL,
                name text NOT NULL,
                operations jsonb NOT NULL,
                status text NOT NULL,
                started_at timestamptz NOT NULL,
                finished_at timestamptz,
                PRIMARY KEY (schema_name, name)
            )
            "#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn begin(&self, record: MigrationRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        lock_schema(&mut tx, &record.schema).await?;

        let active: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT name FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 AND status = $2"
        ))
        .bind(&record.schema)
        .bind(MigrationStatus::InProgress.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((name,)) = active {
            return Err(StoreError::MigrationInProgress(name));
        }

        let duplicate: Option<(String,)> = sqlx::query_as(&format!(
            "SELECT name FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 AND name = $2 AND status <> $3"
        ))
        .bind(&record.schema)
        .bind(&record.name)
        .bind(MigrationStatus::RolledBack.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if duplicate.is_some() {
            return Err(StoreError::DuplicateMigration(record.name));
        }

        // A resubmitted migration supersedes its rolled-back record, so a
        // fixed migration can be retried under the same name.
        sqlx::query(&format!(
            "DELETE FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 AND name = $2"
        ))
        .bind(&record.schema)
        .bind(&record.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {MIGRATIONS_TABLE}
                (schema_name, name, operations, status, started_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#
        ))
        .bind(&record.schema)
        .bind(&record.name)
        .bind(&record.operations)
        .bind(record.status.as_str())
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    async fn finish(&self, schema: &str, status: MigrationStatus) -> Result<MigrationRecord> {
        let mut tx = self.pool.begin().await?;

        lock_schema(&mut tx, schema).await?;
        let record = finish_active(&mut tx, schema, status).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn active(&self, schema: &str) -> Result<Option<MigrationRecord>> {
        let row: Option<MigrationRow> = sqlx::query_as(&format!(
            "SELECT * FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 AND status = $2"
        ))
        .bind(schema)
        .bind(MigrationStatus::InProgress.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn last(&self, schema: &str) -> Result<Option<MigrationRecord>> {
        let row: Option<MigrationRow> = sqlx::query_as(&format!(
            "SELECT * FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 ORDER BY name DESC LIMIT 1"
        ))
        .bind(schema)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn history(&self, schema: &str, first: u16) -> Result<Vec<MigrationRecord>> {
        let rows: Vec<MigrationRow> = sqlx::query_as(&format!(
            "SELECT * FROM {MIGRATIONS_TABLE} WHERE schema_name = $1 ORDER BY name ASC LIMIT $2"
        ))
        .bind(schema)
        .bind(i64::from(first))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
