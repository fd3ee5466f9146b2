use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use federation_core::{TransactionId, TransactionRecord, TransactionState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::LogEntry;
use crate::error::{LogError, Result};
use crate::log::{TransactionLog, is_purgeable};

/// One line of the log file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "line", rename_all = "snake_case")]
enum LogLine {
    /// Full state of a record; written on `begin` and by compaction.
    Snapshot { record: TransactionRecord },
    Entry {
        transaction_id: TransactionId,
        at: DateTime<Utc>,
        entry: LogEntry,
    },
}

#[derive(Debug)]
struct Inner {
    file: File,
    records: HashMap<TransactionId, TransactionRecord>,
    /// A failed append left bytes behind that could not be cut off.
    torn: bool,
}

/// Append-only JSON-lines log, `fsync`ed on every write.
///
/// The whole file is replayed into memory on open. A final line without a
/// trailing newline is the remnant of a crash mid-write and is cut off; any
/// other unparsable line is reported as corruption.
#[derive(Debug)]
pub struct FileTransactionLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

fn poisoned<T>(_: PoisonError<T>) -> LogError {
    LogError::Unavailable("lock poisoned".to_string())
}

impl FileTransactionLog {
    /// Opens `path`, creating it if needed, and replays its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be opened or a complete line in it
    /// can't be parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| LogError::Open {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(open_err)?;

        let Replay {
            records,
            valid_len,
            needs_newline,
        } = replay(&path, &content)?;
        if valid_len < content.len() {
            warn!(
                path = %path.display(),
                dropped_bytes = content.len() - valid_len,
                "discarding torn final line of transaction log"
            );
            file.set_len(valid_len as u64).map_err(open_err)?;
            file.sync_all().map_err(open_err)?;
        } else if needs_newline {
            file.write_all(b"\n").map_err(open_err)?;
            file.sync_all().map_err(open_err)?;
        }

        debug!(path = %path.display(), records = records.len(), "opened transaction log");
        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                records,
                torn: false,
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(poisoned)
    }

    fn compaction_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".compact");
        PathBuf::from(name)
    }

    fn write_line(&self, inner: &mut Inner, line: &LogLine) -> Result<()> {
        if inner.torn {
            return Err(LogError::Unavailable(format!(
                "'{}' ends in a partial line; reopen the log to repair it",
                self.path.display()
            )));
        }
        let mut bytes = serde_json::to_vec(line).map_err(LogError::Serialize)?;
        bytes.push(b'\n');

        append_line(&mut inner.file, &bytes).map_err(|failure| {
            if let Some(rollback) = failure.rollback {
                warn!(
                    path = %self.path.display(),
                    error = %rollback,
                    "could not remove partial line; refusing further writes"
                );
                inner.torn = true;
            }
            LogError::Write {
                path: self.path.clone(),
                source: failure.write,
            }
        })
    }
}

/// End of the file the log appends to.
trait Tail: Write {
    fn end(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl Tail for File {
    fn end(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

#[derive(Debug)]
struct AppendFailure {
    write: io::Error,
    /// Set when the partial line could not be cut off again.
    rollback: Option<io::Error>,
}

/// Appends `bytes` durably. On failure the tail is cut back to where it
/// was, so the next line never lands after a fragment.
fn append_line(tail: &mut impl Tail, bytes: &[u8]) -> std::result::Result<(), AppendFailure> {
    let start = tail.end().map_err(|write| AppendFailure {
        write,
        rollback: None,
    })?;
    let Err(write) = tail.write_all(bytes).and_then(|()| tail.sync()) else {
        return Ok(());
    };
    let rollback = tail.truncate(start).and_then(|()| tail.sync()).err();
    Err(AppendFailure { write, rollback })
}

struct Replay {
    records: HashMap<TransactionId, TransactionRecord>,
    /// Length of the prefix worth keeping.
    valid_len: usize,
    /// The last kept line is missing its newline.
    needs_newline: bool,
}

/// Works on raw bytes: a torn tail may end inside a multi-byte character.
fn replay(path: &Path, content: &[u8]) -> Result<Replay> {
    let mut records = HashMap::new();
    let mut offset = 0;

    for (index, chunk) in content.split_inclusive(|b| *b == b'\n').enumerate() {
        let terminated = chunk.ends_with(b"\n");
        let text = chunk.trim_ascii();
        if text.is_empty() {
            offset += chunk.len();
            continue;
        }

        match serde_json::from_slice::<LogLine>(text) {
            Ok(line) => fold(&mut records, line, index + 1),
            Err(_) if !terminated => {
                return Ok(Replay {
                    records,
                    valid_len: offset,
                    needs_newline: false,
                });
            }
            Err(source) => {
                return Err(LogError::Corrupt {
                    path: path.to_path_buf(),
                    line: index + 1,
                    source,
                });
            }
        }
        offset += chunk.len();
    }

    Ok(Replay {
        records,
        valid_len: offset,
        needs_newline: !content.is_empty() && !content.ends_with(b"\n"),
    })
}

fn fold(records: &mut HashMap<TransactionId, TransactionRecord>, line: LogLine, line_no: usize) {
    match line {
        LogLine::Snapshot { record } => {
            records.insert(record.transaction_id, record);
        }
        LogLine::Entry {
            transaction_id,
            at,
            entry,
        } => match records.get_mut(&transaction_id) {
            Some(record) => {
                if let Err(err) = entry.apply(record, at) {
                    warn!(line = line_no, error = %err, "skipping inapplicable log entry");
                }
            }
            None => {
                warn!(
                    line = line_no,
                    transaction_id = %transaction_id,
                    "skipping entry for unknown transaction"
                );
            }
        },
    }
}

impl TransactionLog for FileTransactionLog {
    fn begin(&self, record: &TransactionRecord) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if inner.records.contains_key(&record.transaction_id) {
            return Err(LogError::AlreadyExists(record.transaction_id));
        }

        self.write_line(
            inner,
            &LogLine::Snapshot {
                record: record.clone(),
            },
        )?;
        inner.records.insert(record.transaction_id, record.clone());
        Ok(())
    }

    fn append(&self, transaction_id: TransactionId, entry: LogEntry) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let mut next = inner
            .records
            .get(&transaction_id)
            .cloned()
            .ok_or(LogError::NotFound(transaction_id))?;

        let at = Utc::now();
        entry.apply(&mut next, at)?;
        self.write_line(
            inner,
            &LogLine::Entry {
                transaction_id,
                at,
                entry,
            },
        )?;
        inner.records.insert(transaction_id, next);
        Ok(())
    }

    fn load(&self, transaction_id: TransactionId) -> Result<Option<TransactionRecord>> {
        Ok(self.lock()?.records.get(&transaction_id).cloned())
    }

    fn list(&self, state: Option<TransactionState>) -> Result<Vec<TransactionRecord>> {
        let guard = self.lock()?;
        let mut out: Vec<_> = guard
            .records
            .values()
            .filter(|r| state.is_none_or(|s| r.state == s))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    /// Rewrites the file with one snapshot per surviving record, through a
    /// temporary file renamed over the original.
    fn purge_terminal(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        let mut survivors: Vec<&TransactionRecord> = inner
            .records
            .values()
            .filter(|r| !is_purgeable(r, older_than))
            .collect();
        let removed = inner.records.len() - survivors.len();
        if removed == 0 {
            return Ok(0);
        }
        survivors.sort_by_key(|r| r.created_at);

        let tmp = self.compaction_path();
        let compact_err = |source| LogError::Compact {
            path: self.path.clone(),
            source,
        };

        let mut out = File::create(&tmp).map_err(compact_err)?;
        for record in survivors {
            let line = LogLine::Snapshot {
                record: record.clone(),
            };
            let mut bytes = serde_json::to_vec(&line).map_err(LogError::Serialize)?;
            bytes.push(b'\n');
            out.write_all(&bytes).map_err(compact_err)?;
        }
        out.sync_all().map_err(compact_err)?;
        drop(out);

        fs::rename(&tmp, &self.path).map_err(compact_err)?;
        inner.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(compact_err)?;
        inner.torn = false;
        inner.records.retain(|_, r| !is_purgeable(r, older_than));

        info!(path = %self.path.display(), removed, "compacted transaction log");
        Ok(removed)
    }
}
