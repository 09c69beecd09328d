use quorum_base::{err, Result};
use std::path::PathBuf;

/// Participant process configuration (§6.5). An empty/unset WAL path means
/// no durability: the process runs in-memory only and has nothing to replay
/// on restart.
#[derive(Clone, Debug)]
pub struct Config {
    pub id: String,
    pub port: u16,
    pub wal_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let id = std::env::var("QUORUM_ID")
            .map_err(|_| err("QUORUM_ID must be set"))?;
        let port = std::env::var("QUORUM_PORT")
            .unwrap_or_else(|_| "8001".to_string())
            .parse()
            .map_err(|_| err("QUORUM_PORT must be a valid port number"))?;
        let wal_path = match std::env::var("QUORUM_WAL") {
            Ok(p) if !p.is_empty() => Some(PathBuf::from(p)),
            _ => None,
        };
        Ok(Config { id, port, wal_path })
    }
}
