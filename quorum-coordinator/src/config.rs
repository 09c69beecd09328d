use quorum_base::{err, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Coordinator process configuration (§6.5), sourced from the environment
/// once at startup. There is no hot reload: these values are read once and
/// the process lives with them until it exits.
#[derive(Clone, Debug)]
pub struct Config {
    pub id: String,
    pub port: u16,
    pub participants: Vec<String>,
    pub request_timeout: Duration,
    /// Post-vote, pre-decision sleep window (§4.1.1). Zero by default; a
    /// pedagogical crash-window simulator, never a protocol requirement.
    pub crash_window: Duration,
    pub decision_log_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let id = std::env::var("QUORUM_ID").unwrap_or_else(|_| "COORD".to_string());
        let port = std::env::var("QUORUM_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| err("QUORUM_PORT must be a valid port number"))?;
        let participants_raw = std::env::var("QUORUM_PARTICIPANTS")
            .map_err(|_| err("QUORUM_PARTICIPANTS must be set to a comma-separated URL list"))?;
        let participants: Vec<String> = participants_raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if participants.is_empty() {
            return Err(err("QUORUM_PARTICIPANTS must name at least one participant"));
        }
        let request_timeout_ms: u64 = std::env::var("QUORUM_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .map_err(|_| err("QUORUM_TIMEOUT_MS must be an integer"))?;
        let crash_window_ms: u64 = std::env::var("QUORUM_CRASH_WINDOW_MS")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| err("QUORUM_CRASH_WINDOW_MS must be an integer"))?;
        let decision_log_path = std::env::var("QUORUM_DECISION_LOG")
            .unwrap_or_else(|_| "coordinator.log".to_string())
            .into();

        Ok(Config {
            id,
            port,
            participants,
            request_timeout: Duration::from_millis(request_timeout_ms),
            crash_window: Duration::from_millis(crash_window_ms),
            decision_log_path,
        })
    }
}
