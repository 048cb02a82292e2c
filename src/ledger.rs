//! Metadata ledger: the ordered list of documents saved during one run.
//!
//! A ledger is created per driver run and handed to everything that saves
//! documents. Clones share the same state, so concurrent workers append
//! through one mutex. The ledger also owns the set of destination paths
//! claimed this run, which prevents two workers (or two listing entries
//! pointing at the same document) from saving or recording the same path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use crate::models::DocumentRecord;
use crate::storage::write_atomic;

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<DocumentRecord>,
    claimed: HashSet<PathBuf>,
}

/// Shared, append-only document ledger.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
}

/// Errors reading or writing a ledger file.
#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("failed to encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to read ledger {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Write(#[from] crate::error::ScrapeError),
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        // A panic while holding the lock cannot leave records half-written,
        // so a poisoned ledger is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one record.
    pub fn append(&self, record: DocumentRecord) {
        debug!(title = %record.title, path = %record.download_path.display(), "ledger append");
        self.lock().records.push(record);
    }

    /// Snapshot of all records in append order.
    pub fn records(&self) -> Vec<DocumentRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim a destination path for this run. Returns false if it was
    /// already claimed.
    pub fn claim(&self, path: &Path) -> bool {
        self.lock().claimed.insert(path.to_path_buf())
    }

    /// Give back a claim after a failed fetch or write.
    pub fn release(&self, path: &Path) {
        self.lock().claimed.remove(path);
    }

    /// Encode all records as a pretty-printed UTF-8 JSON array.
    pub fn to_json(&self) -> Result<String, LedgerError> {
        let state = self.lock();
        Ok(serde_json::to_string_pretty(&state.records)?)
    }

    /// Write the full ledger to `path`, replacing any previous content.
    pub async fn serialize(&self, path: &Path) -> Result<(), LedgerError> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes()).await?;
        info!(
            "Wrote {} metadata records to {}",
            self.len(),
            path.display()
        );
        Ok(())
    }

    /// Intermediate write between listing sections. Same format as
    /// [`Ledger::serialize`].
    pub async fn checkpoint(&self, path: &Path) -> Result<(), LedgerError> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes()).await?;
        debug!("Checkpointed {} records to {}", self.len(), path.display());
        Ok(())
    }

    /// Read records previously written by [`Ledger::serialize`].
    pub async fn load(path: &Path) -> Result<Vec<DocumentRecord>, LedgerError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(title: &str, n: usize) -> DocumentRecord {
        DocumentRecord::new(
            title,
            format!("https://example.org/{}", n),
            PathBuf::from(format!("/data/{}.txt", n)),
            "chinese",
            "China",
        )
    }

    #[test]
    fn test_append_preserves_order() {
        let ledger = Ledger::new();
        ledger.append(record("first", 1));
        ledger.append(record("second", 2));
        let titles: Vec<_> = ledger.records().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }

    #[test]
    fn test_claim_is_exclusive_until_released() {
        let ledger = Ledger::new();
        let path = Path::new("/data/a.pdf");
        assert!(ledger.claim(path));
        assert!(!ledger.claim(path));
        ledger.release(path);
        assert!(ledger.claim(path));
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = Ledger::new();
        let other = ledger.clone();
        other.append(record("shared", 1));
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_serialize_round_trips_non_latin_titles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");

        let ledger = Ledger::new();
        let mut rec = record("国务院令", 1);
        rec.description = Some("Luật Đất đai".to_string());
        ledger.append(rec);
        ledger.serialize(&path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("国务院令"));
        let decoded = Ledger::load(&path).await.unwrap();
        assert_eq!(decoded, ledger.records());
    }

    #[tokio::test]
    async fn test_serialize_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "[{\"stale\": true}, 1, 2, 3]").unwrap();

        let ledger = Ledger::new();
        ledger.append(record("fresh", 1));
        ledger.serialize(&path).await.unwrap();

        let decoded = Ledger::load(&path).await.unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].title, "fresh");
    }
}
