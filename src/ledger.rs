//! Failure ledgers
//!
//! Each crawl stage owns an append-only text file with one line per failed
//! attempt:
//!
//! ```text
//! ID: 1234, Error: HTTP 502 for https://example.com/list/1234.html
//! ```
//!
//! Reading a ledger yields the ids of well-formed lines in file order;
//! anything else (including a torn last line) is skipped.

use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

const ID_PREFIX: &str = "ID: ";
const ERROR_MARKER: &str = ", Error:";

/// Errors raised while writing or reading a ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Cannot append to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Handle to one stage's ledger file
///
/// Appends from concurrent workers are serialized so every entry lands as a
/// single complete line.
#[derive(Debug)]
pub struct FailureLedger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `(id, error)` and syncs it to disk before returning
    pub fn append(&self, id: &str, error: &dyn Display) -> Result<(), LedgerError> {
        // A poisoned lock only means another append panicked; the file is still usable.
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        append(&self.path, id, error)
    }

    /// [`append`](Self::append) run on tokio's blocking pool
    ///
    /// For callers on the async runtime, so the fsync does not stall a worker
    /// thread. Takes owned strings so the returned future is `Send`.
    pub async fn record(self: &Arc<Self>, id: String, message: String) -> Result<(), LedgerError> {
        let ledger = Arc::clone(self);
        tokio::task::spawn_blocking(move || ledger.append(&id, &message))
            .await
            .map_err(|e| LedgerError::Append {
                path: self.path.clone(),
                source: std::io::Error::other(e),
            })?
    }

    /// Ids of all well-formed entries, in file order
    pub fn read_ids(&self) -> Result<Vec<String>, LedgerError> {
        read_ids(&self.path)
    }
}

/// Formats one ledger line, flattening the message onto a single line
pub fn format_entry(id: &str, error: &dyn Display) -> String {
    let message = error
        .to_string()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ");
    format!("{}{}{} {}\n", ID_PREFIX, id, ERROR_MARKER, message)
}

/// Appends one entry to the ledger at `path`, creating the file if needed
///
/// The line is written with a single `write_all` on an append-mode handle and
/// flushed with `sync_data`, so a crash right after return cannot lose it.
pub fn append(path: &Path, id: &str, error: &dyn Display) -> Result<(), LedgerError> {
    let line = format_entry(id, error);
    let to_err = |source| LedgerError::Append {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    file.write_all(line.as_bytes()).map_err(to_err)?;
    file.sync_data().map_err(to_err)?;

    Ok(())
}

/// Reads the ids of all well-formed entries in the ledger at `path`
///
/// A missing ledger means nothing has failed yet and yields an empty list.
pub fn read_ids(path: &Path) -> Result<Vec<String>, LedgerError> {
    let to_err = |source| LedgerError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(to_err(e)),
    };

    let mut ids = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            // Invalid UTF-8 in one entry must not hide the others.
            Err(e) if e.kind() == ErrorKind::InvalidData => continue,
            Err(e) => return Err(to_err(e)),
        };
        match parse_entry_id(&line) {
            Some(id) => ids.push(id.to_string()),
            None => tracing::debug!("Skipping malformed ledger line: {:?}", line),
        }
    }

    Ok(ids)
}

/// Parses `ID: <digits>, Error: ...` and returns the digits
fn parse_entry_id(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(ID_PREFIX)?;
    let digits_end = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(rest.len());

    if digits_end == 0 || !rest[digits_end..].starts_with(ERROR_MARKER) {
        return None;
    }

    Some(&rest[..digits_end])
}
