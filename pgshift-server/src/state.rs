use async_trait::async_trait;
use pgshift::{Result, Session};
use std::sync::Arc;

use crate::config::Config;

/// Opens a fresh engine session for one request. Handlers never share or
/// pool sessions; each one goes through the factory and closes what it got.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Session>;
}

/// Production factory: a new Postgres-backed session per request, bound to
/// the configured schema.
pub struct PgSessionFactory {
    dsn: String,
    schema: String,
}

impl PgSessionFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            dsn: config.pg_conn_string.clone(),
            schema: config.schema.clone(),
        }
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    async fn open(&self) -> Result<Session> {
        Session::open(&self.dsn, &self.schema).await
    }
}

#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<dyn SessionFactory>,
}

impl AppState {
    pub fn new<F: SessionFactory + 'static>(factory: F) -> Self {
        Self {
            factory: Arc::new(factory),
        }
    }
}
