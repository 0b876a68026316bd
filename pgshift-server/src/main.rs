use anyhow::Result;
use pgshift_server::{
    config::Config,
    router,
    state::{AppState, PgSessionFactory},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;

    let app = router::create().with_state(AppState::new(PgSessionFactory::new(&config)));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, schema = %config.schema, "pgshift server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
