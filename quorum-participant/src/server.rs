use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use quorum_wire::{
    OkResponse, ParticipantStatusResponse, PrepareRequest, PrepareResponse, TxIdRequest,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::Engine;

pub type SharedEngine = Arc<Engine>;

pub fn router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/prepare", post(prepare))
        .route("/can_commit", post(can_commit))
        .route("/precommit", post(precommit))
        .route("/commit", post(commit))
        .route("/abort", post(abort))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(engine)
}

async fn prepare(
    State(engine): State<SharedEngine>,
    Json(req): Json<PrepareRequest>,
) -> Json<PrepareResponse> {
    match engine.prepare(&req.txid, req.op) {
        Ok((vote, state)) => Json(PrepareResponse {
            vote,
            state: state.as_str().to_string(),
        }),
        Err(e) => fatal_wal_error(&req.txid, e),
    }
}

async fn can_commit(
    State(engine): State<SharedEngine>,
    Json(req): Json<PrepareRequest>,
) -> Json<PrepareResponse> {
    match engine.can_commit(&req.txid, req.op) {
        Ok((vote, state)) => Json(PrepareResponse {
            vote,
            state: state.as_str().to_string(),
        }),
        Err(e) => fatal_wal_error(&req.txid, e),
    }
}

async fn precommit(State(engine): State<SharedEngine>, Json(req): Json<TxIdRequest>) -> Json<OkResponse> {
    if let Err(e) = engine.precommit(&req.txid) {
        fatal_wal_error_unit(&req.txid, e);
    }
    Json(OkResponse::OK)
}

async fn commit(State(engine): State<SharedEngine>, Json(req): Json<TxIdRequest>) -> Json<OkResponse> {
    if let Err(e) = engine.commit(&req.txid) {
        fatal_wal_error_unit(&req.txid, e);
    }
    Json(OkResponse::OK)
}

async fn abort(State(engine): State<SharedEngine>, Json(req): Json<TxIdRequest>) -> Json<OkResponse> {
    if let Err(e) = engine.abort(&req.txid) {
        fatal_wal_error_unit(&req.txid, e);
    }
    Json(OkResponse::OK)
}

async fn status(State(engine): State<SharedEngine>) -> Json<ParticipantStatusResponse> {
    let (tx, kv) = engine.status();
    let tx = tx
        .into_iter()
        .map(|(txid, record)| {
            (
                txid,
                json!({
                    "state": record.state.as_str(),
                    "op": record.op,
                }),
            )
        })
        .collect::<BTreeMap<_, _>>();
    Json(ParticipantStatusResponse { ok: true, tx, kv })
}

async fn healthz() -> Json<OkResponse> {
    Json(OkResponse::OK)
}

/// A WAL write failure is fatal (§7): there is no safe way to tell the
/// coordinator "yes" or "ok" without the fsync backing it, so the whole
/// process goes down rather than silently lose durability.
fn fatal_wal_error(txid: &str, e: quorum_base::Error) -> Json<PrepareResponse> {
    tracing::error!(txid, error = %e, "WAL write failed, exiting");
    std::process::exit(1);
}

fn fatal_wal_error_unit(txid: &str, e: quorum_base::Error) {
    tracing::error!(txid, error = %e, "WAL write failed, exiting");
    std::process::exit(1);
}
