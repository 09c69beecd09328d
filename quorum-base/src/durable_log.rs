// Both the coordinator's decision log and the participant's write-ahead log
// are the same shape underneath: an append-only sequence of single-line text
// records, each flushed and fsync'd before the caller is allowed to proceed.
// Factoring that out here means the fsync discipline only has to be gotten
// right once.

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub struct AppendLog {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl AppendLog {
    /// Open (creating if absent) the log at `path`. Passing `None` yields a
    /// log that accepts appends but never persists them, for callers that
    /// run with durability explicitly disabled.
    pub fn open(path: Option<impl AsRef<Path>>) -> Result<Self> {
        match path {
            Some(p) => {
                let p = p.as_ref().to_path_buf();
                let file = OpenOptions::new().create(true).append(true).open(&p)?;
                Ok(Self {
                    file: Some(file),
                    path: Some(p),
                })
            }
            None => Ok(Self {
                file: None,
                path: None,
            }),
        }
    }

    /// Append one record, flush, and fsync before returning. No-op if this
    /// log has no backing file.
    pub fn append(&mut self, line: &str) -> Result<()> {
        if let Some(file) = &mut self.file {
            writeln!(file, "{line}")?;
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Read back every record currently on disk, in order. Empty if there is
    /// no backing file or it doesn't exist yet.
    pub fn read_all(&self) -> Result<Vec<String>> {
        match &self.path {
            Some(p) if p.exists() => {
                let reader = BufReader::new(File::open(p)?);
                Ok(reader.lines().collect::<std::io::Result<Vec<String>>>()?)
            }
            _ => Ok(Vec::new()),
        }
    }
}
