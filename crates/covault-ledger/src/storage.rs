use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::LedgerError;
use crate::ledger::TokenLedger;

/// Snapshot persistence backend.
///
/// `Memory` keeps the latest snapshot in process memory only; `JsonFile`
/// writes it to disk. Loading always re-verifies the aggregate's journal
/// hash chain before the state is accepted.
#[derive(Debug, Clone)]
pub enum SnapshotStore {
    Memory { buffer: Option<String> },
    JsonFile { path: PathBuf },
}

impl SnapshotStore {
    pub fn memory() -> Self {
        Self::Memory { buffer: None }
    }

    pub fn json_file(path: impl Into<PathBuf>) -> Self {
        Self::JsonFile { path: path.into() }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::JsonFile { .. } => "json-file",
        }
    }

    /// Serialize and store a snapshot of `state`.
    pub fn save<T: Serialize>(&mut self, state: &T) -> Result<(), LedgerError> {
        let encoded = serde_json::to_string_pretty(state)
            .map_err(|e| LedgerError::Snapshot(e.to_string()))?;
        match self {
            Self::Memory { buffer } => {
                *buffer = Some(encoded);
            }
            Self::JsonFile { path } => {
                fs::write(path, encoded).map_err(|e| LedgerError::Snapshot(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// Load the latest snapshot.
    pub fn load<T: DeserializeOwned>(&self) -> Result<T, LedgerError> {
        let encoded = match self {
            Self::Memory { buffer } => buffer
                .clone()
                .ok_or_else(|| LedgerError::Snapshot("no snapshot stored".to_string()))?,
            Self::JsonFile { path } => {
                fs::read_to_string(path).map_err(|e| LedgerError::Snapshot(e.to_string()))?
            }
        };
        serde_json::from_str(&encoded).map_err(|e| LedgerError::Snapshot(e.to_string()))
    }
}

impl TokenLedger {
    /// Persist the ledger to the store.
    pub fn checkpoint(&self, store: &mut SnapshotStore) -> Result<(), LedgerError> {
        store.save(self)?;
        info!(backend = store.label(), "ledger checkpointed");
        Ok(())
    }

    /// Hydrate a ledger from the store, verifying the journal hash chain
    /// before accepting the state.
    pub fn restore(store: &SnapshotStore) -> Result<TokenLedger, LedgerError> {
        let ledger: TokenLedger = store.load()?;
        ledger.journal().verify()?;
        info!(backend = store.label(), "ledger restored");
        Ok(ledger)
    }
}
