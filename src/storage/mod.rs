//! Persistence layer.
//!
//! Saves and loads the trade ledger to/from a JSON file. The file is the
//! sole source of truth across restarts, so writes are full-document and
//! atomic: serialize to `<path>.tmp`, then rename over the final path.
//! A lock file guards against two agent processes sharing one ledger.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{ArbwatchError, LedgerState};

/// Handle to the ledger state file.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_os_string();
        os.push(".tmp");
        PathBuf::from(os)
    }

    /// Load ledger state from disk.
    /// Returns None if the file doesn't exist (fresh start).
    pub fn load(&self) -> Result<Option<LedgerState>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No saved ledger found, starting fresh");
            return Ok(None);
        }

        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ledger from {}", self.path.display()))?;

        let state: LedgerState = serde_json::from_str(&json).map_err(|e| {
            ArbwatchError::Storage(format!(
                "Ledger file {} is corrupt: {e}",
                self.path.display()
            ))
        })?;

        info!(
            path = %self.path.display(),
            balance = %state.usd_balance,
            trades = state.trade_count(),
            "Ledger loaded from disk"
        );

        Ok(Some(state))
    }

    /// Persist the full ledger state in one write.
    ///
    /// The document goes to a sibling tmp file first and is renamed into
    /// place, so a reader never observes a partially written ledger.
    pub fn save(&self, state: &LedgerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory {}", parent.display())
                })?;
            }
        }

        let json =
            serde_json::to_string_pretty(state).context("Failed to serialise ledger state")?;

        let tmp = self.tmp_path();
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write ledger to {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!(
                "Failed to move {} into place at {}",
                tmp.display(),
                self.path.display()
            )
        })?;

        debug!(
            path = %self.path.display(),
            balance = %state.usd_balance,
            trades = state.trade_count(),
            "Ledger saved"
        );
        Ok(())
    }

    /// Delete the ledger file (for testing or reset).
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).with_context(|| {
                format!("Failed to delete ledger file {}", self.path.display())
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Exclusive access
// ---------------------------------------------------------------------------

/// Exclusive-access guard for a ledger file.
///
/// Created with `O_EXCL` semantics next to the state file and held for the
/// executor's lifetime; a second process fails fast instead of silently
/// interleaving read-modify-write cycles. Removed on drop.
#[derive(Debug)]
pub struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    pub fn acquire(state_path: &Path) -> Result<Self, ArbwatchError> {
        let mut os = state_path.as_os_str().to_os_string();
        os.push(".lock");
        let path = PathBuf::from(os);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ArbwatchError::Storage(format!(
                        "Failed to create state directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    ArbwatchError::LedgerLocked(format!(
                        "{} is held by another process; remove it if the owner is gone",
                        path.display()
                    ))
                } else {
                    ArbwatchError::Storage(format!(
                        "Failed to create lock file {}: {e}",
                        path.display()
                    ))
                }
            })?;

        // Owner breadcrumb for operators inspecting a stale lock.
        let _ = writeln!(file, "pid={} token={}", std::process::id(), uuid::Uuid::new_v4());

        info!(path = %path.display(), "Ledger lock acquired");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeRecord;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("arbwatch_test_ledger_{}.json", uuid::Uuid::new_v4()));
        p
    }

    fn make_state() -> LedgerState {
        let mut state = LedgerState::new(dec!(10000));
        state.apply_trade(TradeRecord {
            timestamp: Utc::now(),
            buy_from: "coinbase".to_string(),
            sell_to: "binance_us".to_string(),
            buy_price: dec!(64000),
            sell_price: dec!(64500),
            amount_usd: dec!(1000),
            profit_usd: dec!(5.80),
            balance_usd: dec!(10005.80),
            fees_paid_usd: dec!(2.0068),
        });
        state
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let store = LedgerStore::new(temp_path());
        let state = make_state();
        store.save(&state).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.usd_balance, dec!(10005.80));
        assert_eq!(loaded.total_fees, dec!(2.0068));
        assert_eq!(loaded.trade_history.len(), 1);

        store.delete().unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let store = LedgerStore::new("/tmp/arbwatch_nonexistent_ledger_12345.json");
        let loaded = store.load().unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("arbwatch_test_{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("ledger.json");

        let store = LedgerStore::new(&path);
        store.save(&LedgerState::new(dec!(500))).unwrap();
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_leaves_no_tmp_file() {
        let store = LedgerStore::new(temp_path());
        store.save(&make_state()).unwrap();
        assert!(store.path().exists());
        assert!(!store.tmp_path().exists());
        store.delete().unwrap();
    }

    #[test]
    fn test_load_corrupt_file() {
        let path = temp_path();
        std::fs::write(&path, "{ this is not json").unwrap();
        let store = LedgerStore::new(&path);
        let err = store.load().unwrap_err();
        assert!(format!("{err}").contains("corrupt"));
        store.delete().unwrap();
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        let store = LedgerStore::new("/tmp/arbwatch_does_not_exist_xyz.json");
        assert!(store.delete().is_ok());
    }

    #[test]
    fn test_lock_excludes_second_holder() {
        let state_path = temp_path();
        let lock = LedgerLock::acquire(&state_path).unwrap();
        assert!(lock.path().exists());

        let second = LedgerLock::acquire(&state_path);
        assert!(matches!(second, Err(ArbwatchError::LedgerLocked(_))));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let state_path = temp_path();
        let lock_path = {
            let lock = LedgerLock::acquire(&state_path).unwrap();
            lock.path().to_path_buf()
        };
        assert!(!lock_path.exists());

        // Reacquire works once the first holder is gone.
        let lock = LedgerLock::acquire(&state_path).unwrap();
        assert!(lock.path().exists());
    }
}
