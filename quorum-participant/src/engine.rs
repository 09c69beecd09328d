// The participant's per-transaction state machine (§4.2), WAL-backed and
// crash-recoverable. `Engine::open` replays the WAL once at construction and
// every mutating call below re-derives the same transition the replay path
// takes for its event, so live handling and recovery can never diverge
// (invariant 4, §3).

use quorum_base::Result;
use quorum_wire::{op_is_set, op_key_value, Op, Vote};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::wal::{Wal, WalRecord};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxState {
    Ready,
    Precommit,
    Committed,
    Aborted,
}

impl TxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxState::Ready => "READY",
            TxState::Precommit => "PRECOMMIT",
            TxState::Committed => "COMMITTED",
            TxState::Aborted => "ABORTED",
        }
    }
}

#[derive(Clone, Debug)]
pub struct TxRecord {
    pub state: TxState,
    pub op: Op,
}

struct Shared {
    tx: BTreeMap<String, TxRecord>,
    kv: BTreeMap<String, String>,
}

pub struct Engine {
    wal: Mutex<Wal>,
    shared: Mutex<Shared>,
}

impl Engine {
    pub fn open(wal_path: Option<impl AsRef<Path>>) -> Result<Self> {
        let wal = Wal::open(wal_path)?;
        let mut shared = Shared {
            tx: BTreeMap::new(),
            kv: BTreeMap::new(),
        };
        let records = wal.read_records()?;
        info!(count = records.len(), "replaying write-ahead log");
        for record in records {
            replay_one(&mut shared, record);
        }
        Ok(Engine {
            wal: Mutex::new(wal),
            shared: Mutex::new(shared),
        })
    }

    pub fn prepare(&self, txid: &str, op: Op) -> Result<(Vote, TxState)> {
        self.vote(txid, op, "PREPARE")
    }

    pub fn can_commit(&self, txid: &str, op: Op) -> Result<(Vote, TxState)> {
        self.vote(txid, op, "CAN_COMMIT")
    }

    fn vote(&self, txid: &str, op: Op, event: &str) -> Result<(Vote, TxState)> {
        let vote = if op_is_set(&op) { Vote::Yes } else { Vote::No };
        let state = if vote.is_yes() {
            TxState::Ready
        } else {
            TxState::Aborted
        };
        {
            let mut shared = self.shared.lock().unwrap();
            shared.tx.insert(
                txid.to_string(),
                TxRecord {
                    state,
                    op: op.clone(),
                },
            );
        }
        self.wal.lock().unwrap().append_vote(txid, event, vote, &op)?;
        Ok((vote, state))
    }

    /// Unknown txid is a silent no-op (§4.2, §9): this simplifies coordinator
    /// fan-out at the cost of a participant that missed `prepare` silently
    /// ignoring a later `precommit`.
    pub fn precommit(&self, txid: &str) -> Result<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            if let Some(record) = shared.tx.get_mut(txid) {
                record.state = TxState::Precommit;
            }
        }
        self.wal.lock().unwrap().append_event(txid, "PRECOMMIT")
    }

    pub fn commit(&self, txid: &str) -> Result<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            let Shared { tx, kv } = &mut *shared;
            if let Some(record) = tx.get_mut(txid) {
                if matches!(record.state, TxState::Ready | TxState::Precommit) {
                    apply_op(&record.op, kv);
                    record.state = TxState::Committed;
                }
            }
        }
        self.wal.lock().unwrap().append_event(txid, "COMMIT")
    }

    pub fn abort(&self, txid: &str) -> Result<()> {
        {
            let mut shared = self.shared.lock().unwrap();
            if let Some(record) = shared.tx.get_mut(txid) {
                record.state = TxState::Aborted;
            }
        }
        self.wal.lock().unwrap().append_event(txid, "ABORT")
    }

    pub fn status(&self) -> (BTreeMap<String, TxRecord>, BTreeMap<String, String>) {
        let shared = self.shared.lock().unwrap();
        (shared.tx.clone(), shared.kv.clone())
    }
}

fn apply_op(op: &Op, kv: &mut BTreeMap<String, String>) {
    if let Some((key, value)) = op_key_value(op) {
        kv.insert(key.to_string(), value);
    }
}

fn replay_one(shared: &mut Shared, record: WalRecord) {
    match record {
        WalRecord::Prepare { txid, vote, op } | WalRecord::CanCommit { txid, vote, op } => {
            let state = if vote.is_yes() {
                TxState::Ready
            } else {
                TxState::Aborted
            };
            shared.tx.insert(txid, TxRecord { state, op });
        }
        WalRecord::Precommit { txid } => {
            if let Some(record) = shared.tx.get_mut(&txid) {
                record.state = TxState::Precommit;
            }
        }
        WalRecord::Commit { txid } => {
            let Shared { tx, kv } = shared;
            if let Some(record) = tx.get_mut(&txid) {
                if matches!(record.state, TxState::Ready | TxState::Precommit) {
                    apply_op(&record.op, kv);
                    record.state = TxState::Committed;
                }
            }
        }
        WalRecord::Abort { txid } => {
            if let Some(record) = shared.tx.get_mut(&txid) {
                record.state = TxState::Aborted;
            }
        }
    }
}
