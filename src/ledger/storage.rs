//! Ledger persistence backends.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::error::PortalError;
use crate::ledger::record::TransactionRecord;

/// Network key → records, in insertion order.
pub type LedgerSnapshot = HashMap<String, Vec<TransactionRecord>>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transaction not found: {0}")]
    NotFound(String),

    #[error("Ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<LedgerError> for PortalError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => PortalError::InvariantViolation(err.to_string()),
            other => PortalError::Storage(other.to_string()),
        }
    }
}

/// Durable key-value storage for the whole ledger.
pub trait LedgerStorage: Send + Sync {
    fn load(&self) -> Result<LedgerSnapshot, LedgerError>;

    fn persist(&self, snapshot: &LedgerSnapshot) -> Result<(), LedgerError>;
}

/// Process-scoped storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<LedgerSnapshot>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStorage for MemoryStorage {
    fn load(&self) -> Result<LedgerSnapshot, LedgerError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn persist(&self, snapshot: &LedgerSnapshot) -> Result<(), LedgerError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        Ok(())
    }
}

/// JSON file that survives restarts.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LedgerStorage for JsonFileStorage {
    fn load(&self) -> Result<LedgerSnapshot, LedgerError> {
        if !self.path.exists() {
            return Ok(LedgerSnapshot::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let snapshot: LedgerSnapshot = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %self.path.display(),
            networks = snapshot.len(),
            "Loaded transaction ledger"
        );
        Ok(snapshot)
    }

    fn persist(&self, snapshot: &LedgerSnapshot) -> Result<(), LedgerError> {
        // Write a sibling file first so a crash never leaves a truncated ledger
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
