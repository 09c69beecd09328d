// The participant's write-ahead log (§3, §4.2.2). Every state-changing
// event is one line; the WAL is the authoritative record and the in-memory
// transaction table is a cache rebuilt from it on restart.

use quorum_base::{err, AppendLog, Result};
use quorum_wire::{Op, Vote};
use std::path::Path;

#[derive(Clone, Debug, PartialEq)]
pub enum WalRecord {
    Prepare { txid: String, vote: Vote, op: Op },
    CanCommit { txid: String, vote: Vote, op: Op },
    Precommit { txid: String },
    Commit { txid: String },
    Abort { txid: String },
}

pub struct Wal(AppendLog);

impl Wal {
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self> {
        Ok(Wal(AppendLog::open(path)?))
    }

    pub fn append_vote(&mut self, txid: &str, event: &str, vote: Vote, op: &Op) -> Result<()> {
        let op_json = serde_json::to_string(op)?;
        self.0.append(&format!("{txid} {event} {vote} {op_json}"))
    }

    pub fn append_event(&mut self, txid: &str, event: &str) -> Result<()> {
        self.0.append(&format!("{txid} {event}"))
    }

    /// Every record currently on disk, parsed in order. Used only at
    /// startup; replay never re-appends.
    pub fn read_records(&self) -> Result<Vec<WalRecord>> {
        self.0.read_all()?.iter().map(|line| parse_line(line)).collect()
    }
}

fn parse_line(line: &str) -> Result<WalRecord> {
    let mut parts = line.splitn(3, ' ');
    let txid = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| err("WAL record missing txid"))?.to_string();
    let event = parts.next().ok_or_else(|| err("WAL record missing event"))?;
    let rest = parts.next();

    match event {
        "PREPARE" | "CAN_COMMIT" => {
            let rest = rest.ok_or_else(|| err("WAL PREPARE/CAN_COMMIT record missing vote/op"))?;
            let mut rest_parts = rest.splitn(2, ' ');
            let vote = Vote::parse(rest_parts.next().ok_or_else(|| err("WAL record missing vote"))?);
            let op_json = rest_parts.next().ok_or_else(|| err("WAL record missing op json"))?;
            let op: Op = serde_json::from_str(op_json)?;
            if event == "PREPARE" {
                Ok(WalRecord::Prepare { txid, vote, op })
            } else {
                Ok(WalRecord::CanCommit { txid, vote, op })
            }
        }
        "PRECOMMIT" => Ok(WalRecord::Precommit { txid }),
        "COMMIT" => Ok(WalRecord::Commit { txid }),
        "ABORT" => Ok(WalRecord::Abort { txid }),
        other => Err(err(format!("unknown WAL event tag {other:?}"))),
    }
}
