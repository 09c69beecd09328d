use quorum_base::{AppendLog, Result};
use quorum_wire::Decision;
use std::path::Path;

/// The coordinator's append-only record of per-transaction outcomes (§3).
/// Every record is fsync'd before the corresponding decision is dispatched
/// to any participant; this is the coordinator's single safety contract.
pub struct DecisionLog(AppendLog);

impl DecisionLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(DecisionLog(AppendLog::open(Some(path))?))
    }

    pub fn append(&mut self, txid: &str, decision: Decision) -> Result<()> {
        self.0.append(&format!("{txid} {decision}"))
    }

    pub fn read_all(&self) -> Result<Vec<String>> {
        self.0.read_all()
    }
}
