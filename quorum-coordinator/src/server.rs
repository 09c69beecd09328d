use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use quorum_wire::{CoordinatorStatusResponse, OkResponse, Protocol, StartTxRequest, StartTxResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::client::HttpParticipantClient;
use crate::engine::Engine;

pub type SharedEngine = Arc<Engine<HttpParticipantClient>>;

pub fn router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/tx/start", post(start_tx))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(engine)
}

async fn start_tx(
    State(engine): State<SharedEngine>,
    Json(req): Json<StartTxRequest>,
) -> Json<StartTxResponse> {
    let protocol = Protocol::parse(req.protocol.as_deref());
    info!(txid = %req.txid, %protocol, "starting transaction");
    match engine.start_tx(req.txid.clone(), req.op, protocol).await {
        Ok((decision, votes)) => Json(StartTxResponse {
            ok: true,
            txid: req.txid,
            decision,
            votes,
        }),
        Err(e) => {
            // A decision-log write failure is fatal (§7): the response to
            // the client must never precede the fsync, and there is no safe
            // way to continue serving once durability is in question.
            tracing::error!(txid = %req.txid, error = %e, "decision log write failed, exiting");
            std::process::exit(1);
        }
    }
}

async fn status(State(engine): State<SharedEngine>) -> Json<CoordinatorStatusResponse> {
    let tx = engine
        .status()
        .into_iter()
        .map(|(txid, record)| {
            (
                txid,
                json!({
                    "protocol": record.protocol.to_string(),
                    "state": format!("{:?}", record.state),
                    "op": record.op,
                    "votes": record.votes.iter().map(|(k, v)| (k.clone(), v.to_string())).collect::<std::collections::BTreeMap<_, _>>(),
                }),
            )
        })
        .collect::<std::collections::BTreeMap<String, Value>>();
    Json(CoordinatorStatusResponse { ok: true, tx })
}

async fn healthz() -> Json<OkResponse> {
    Json(OkResponse::OK)
}
