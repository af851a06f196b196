//! Durable scan record store.
//!
//! Records live in a single JSON array. Each append reads the array under
//! an exclusive file lock, pushes the record and atomically replaces the
//! file through a temp file. A store that cannot be read or written is
//! quarantined (renamed aside with a timestamp) and reinitialized once.

use crate::{Error, Result, ScanRecord, TokenLedger};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// How an append ended
#[derive(Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The store was quarantined and reinitialized before the append succeeded
    Recovered { quarantined: Option<PathBuf> },
    /// Both attempts failed; the record only lives in the in-memory ledger
    Lost { reason: String },
}

/// Sink for committed scan records
pub trait RecordSink {
    fn append(&mut self, record: &ScanRecord) -> AppendOutcome;
}

/// JSON-array record store with quarantine recovery
#[derive(Clone, Debug)]
pub struct JsonLogStore {
    path: PathBuf,
}

impl JsonLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Single append attempt: read, push, atomically rewrite
    pub fn try_append(&self, record: &ScanRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let result = self.rewrite_locked(&file, record);
        let _ = file.unlock();
        result?;

        tracing::debug!("Appended record for {} to {:?}", record.token, self.path);
        Ok(())
    }

    fn rewrite_locked(&self, file: &File, record: &ScanRecord) -> Result<()> {
        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(file);
        reader.read_to_string(&mut contents)?;

        let mut records = parse_records(&contents)
            .map_err(|e| Error::Store(format!("unreadable store {:?}: {}", self.path, e)))?;
        records.push(record.clone());
        write_atomically(&self.path, &records)
    }

    /// Rename the store aside and start a fresh, empty one
    pub fn quarantine(&self) -> Result<Option<PathBuf>> {
        let moved = if self.path.exists() {
            let target = self.quarantine_path();
            std::fs::rename(&self.path, &target)?;
            tracing::warn!("Quarantined record store {:?} -> {:?}", self.path, target);
            Some(target)
        } else {
            None
        };

        self.ensure_parent_dir()?;
        std::fs::write(&self.path, "[]")?;
        Ok(moved)
    }

    fn quarantine_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "qr_log.json".into());
        let stamp = chrono::Utc::now().timestamp();

        let mut candidate = self.path.with_file_name(format!("{}.corrupt.{}.json", name, stamp));
        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .path
                .with_file_name(format!("{}.corrupt.{}-{}.json", name, stamp, n));
            n += 1;
        }
        candidate
    }
}

impl RecordSink for JsonLogStore {
    fn append(&mut self, record: &ScanRecord) -> AppendOutcome {
        let first = match self.try_append(record) {
            Ok(()) => return AppendOutcome::Appended,
            Err(e) => e,
        };
        tracing::warn!("Record append failed ({}), resetting store {:?}", first, self.path);

        let quarantined = match self.quarantine() {
            Ok(moved) => moved,
            Err(e) => {
                tracing::error!("Cannot reset record store {:?}: {}", self.path, e);
                return AppendOutcome::Lost {
                    reason: e.to_string(),
                };
            }
        };

        match self.try_append(record) {
            Ok(()) => AppendOutcome::Recovered { quarantined },
            Err(e) => {
                tracing::error!(
                    "Record for {} not persisted, continuing on in-memory ledger: {}",
                    record.token,
                    e
                );
                AppendOutcome::Lost {
                    reason: e.to_string(),
                }
            }
        }
    }
}

fn parse_records(contents: &str) -> std::result::Result<Vec<ScanRecord>, serde_json::Error> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(contents)
}

fn write_atomically(path: &Path, records: &[ScanRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        serde_json::to_writer(&mut writer, records)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn read_store_text(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    file.lock_shared()?;

    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    let _ = file.unlock();
    read?;
    Ok(contents)
}

/// Read every record in the store
///
/// A missing or empty store is an empty collection. Any malformed entry
/// fails the whole read.
pub fn read_records(path: &Path) -> Result<Vec<ScanRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let records = parse_records(&read_store_text(path)?)?;
    tracing::debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Read the newest `window` entries, skipping any that are not valid records
///
/// Only a store that is not a JSON array at all is an error.
pub fn read_recent_records(path: &Path, window: usize) -> Result<Vec<ScanRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = read_store_text(path)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)?;
    let start = entries.len().saturating_sub(window);

    let mut records = Vec::with_capacity(entries.len() - start);
    for (index, entry) in entries.into_iter().enumerate().skip(start) {
        match serde_json::from_value::<ScanRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Skipping malformed record {} in {:?}: {}", index, path, e);
            }
        }
    }
    tracing::debug!("Read {} recent records from {:?}", records.len(), path);
    Ok(records)
}

/// Rebuild the checked-in ledger from the newest `window` records
///
/// Malformed entries are skipped. A store that cannot be read at all
/// yields an empty ledger so the kiosk still starts.
pub fn reconstruct(path: &Path, window: usize) -> TokenLedger {
    match read_recent_records(path, window) {
        Ok(records) => {
            let ledger = TokenLedger::from_records(&records, window);
            tracing::info!(
                "Restored {} checked-in tokens from {:?}",
                ledger.len(),
                path
            );
            ledger
        }
        Err(e) => {
            tracing::warn!("Record store {:?} unreadable ({}), starting empty", path, e);
            TokenLedger::new()
        }
    }
}
