use quorum_coordinator::{Config, DecisionLog, Engine, HttpParticipantClient};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    quorum_base::init_tracing("info");

    let config = Config::from_env()?;
    info!(id = %config.id, port = config.port, participants = ?config.participants, "starting coordinator");

    let decision_log = DecisionLog::open(&config.decision_log_path)?;
    let client = HttpParticipantClient::new(config.request_timeout);
    let engine = Arc::new(Engine::new(
        client,
        config.participants.clone(),
        config.crash_window,
        decision_log,
    ));

    let app = quorum_coordinator::server::router(engine);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
