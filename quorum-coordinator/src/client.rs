// Drives the wire-level side of the `Participant` trait over HTTP/JSON
// (§6.1). Every outbound request is bounded by `timeout`; during voting a
// failure becomes `None` (folded into NO_TIMEOUT by the engine), and during
// commit/abort/precommit dispatch a failure is just logged and swallowed —
// the durable decision is the authoritative outcome either way (§7).

use async_trait::async_trait;
use quorum_wire::{Op, PrepareRequest, PrepareResponse, TxIdRequest, Vote};
use std::time::Duration;
use tracing::warn;

use crate::engine::Participant;

pub struct HttpParticipantClient {
    http: reqwest::Client,
}

impl HttpParticipantClient {
    pub fn new(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a sane default TLS/connector config");
        HttpParticipantClient { http }
    }

    async fn vote_request(&self, url: String, txid: &str, op: &Op) -> Option<Vote> {
        let body = PrepareRequest {
            txid: txid.to_string(),
            op: op.clone(),
        };
        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(url = %url, status = %resp.status(), "participant returned non-200");
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "participant unreachable");
                return None;
            }
        };
        match resp.json::<PrepareResponse>().await {
            Ok(parsed) => Some(parsed.vote),
            Err(e) => {
                warn!(url = %url, error = %e, "participant reply did not parse");
                None
            }
        }
    }

    async fn fire_and_forget(&self, url: String, txid: &str) {
        let body = TxIdRequest {
            txid: txid.to_string(),
        };
        if let Err(e) = self.http.post(&url).json(&body).send().await {
            warn!(url = %url, error = %e, "dispatch swallowed: decision log is authoritative");
        }
    }
}

#[async_trait]
impl Participant for HttpParticipantClient {
    async fn prepare(&self, endpoint: &str, txid: &str, op: &Op) -> Option<Vote> {
        self.vote_request(format!("{}/prepare", endpoint.trim_end_matches('/')), txid, op)
            .await
    }

    async fn can_commit(&self, endpoint: &str, txid: &str, op: &Op) -> Option<Vote> {
        self.vote_request(format!("{}/can_commit", endpoint.trim_end_matches('/')), txid, op)
            .await
    }

    async fn precommit(&self, endpoint: &str, txid: &str) {
        self.fire_and_forget(format!("{}/precommit", endpoint.trim_end_matches('/')), txid)
            .await
    }

    async fn commit(&self, endpoint: &str, txid: &str) {
        self.fire_and_forget(format!("{}/commit", endpoint.trim_end_matches('/')), txid)
            .await
    }

    async fn abort(&self, endpoint: &str, txid: &str) {
        self.fire_and_forget(format!("{}/abort", endpoint.trim_end_matches('/')), txid)
            .await
    }
}
