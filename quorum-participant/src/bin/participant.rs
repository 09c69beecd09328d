use quorum_participant::{Config, Engine};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    quorum_base::init_tracing("info");

    let config = Config::from_env()?;
    info!(id = %config.id, port = config.port, wal = ?config.wal_path, "starting participant");

    let engine = Arc::new(Engine::open(config.wal_path.as_ref())?);

    let app = quorum_participant::server::router(engine);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
