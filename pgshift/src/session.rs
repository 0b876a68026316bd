use pgshift_store::MigrationRecord;

use crate::{
    engine::{Engine, SchemaStatus},
    error::Result,
    migration::Migration,
};

/// Short-lived handle to the migration engine, scoped to one lifecycle
/// operation. Created per request and closed at the end of it, never shared
/// or pooled across requests.
#[derive(Clone)]
pub struct Session {
    engine: Box<dyn Engine>,
}

impl Session {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub async fn init(&self) -> Result<()> {
        self.engine.init().await
    }

    pub async fn start(&self, migration: &Migration) -> Result<()> {
        self.engine.start(migration).await
    }

    pub async fn complete(&self) -> Result<MigrationRecord> {
        self.engine.complete().await
    }

    pub async fn rollback(&self) -> Result<MigrationRecord> {
        self.engine.rollback().await
    }

    pub async fn status(&self) -> Result<SchemaStatus> {
        self.engine.status().await
    }

    pub async fn close(&self) -> Result<()> {
        self.engine.close().await
    }
}

#[cfg(feature = "pg")]
mod open {
    use sqlx::{postgres::PgPoolOptions, Executor};

    use super::Session;
    use crate::{engine::PgEngine, error::Result};

    /// Lock timeout applied to every connection a session hands to the
    /// engine, so a blocked DDL statement fails instead of queueing behind
    /// long-running transactions.
    const LOCK_TIMEOUT_MS: u16 = 500;

    impl Session {
        /// Open a session against `schema`, ensuring the state store is
        /// initialized. No partial session escapes on failure: the pool is
        /// the only resource and it is dropped with the error.
        pub async fn open(dsn: &str, schema: &str) -> Result<Self> {
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute(
                            format!("SET lock_timeout TO '{LOCK_TIMEOUT_MS}ms'").as_str(),
                        )
                        .await?;

                        Ok(())
                    })
                })
                .connect(dsn)
                .await?;

            let session = Self::new(PgEngine::new(&pool, schema));
            session.init().await?;

            Ok(session)
        }
    }
}
