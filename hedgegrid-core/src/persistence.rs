//! Durable strategy state: peak balance and realized PnL.
//!
//! One JSON file per instrument, written atomically (temp file in the same
//! directory, fsync, rename into place) so readers never observe a partial
//! file. Loading is forgiving: a missing file is a fresh start and invalid
//! JSON is logged and ignored.

use crate::core::errors::PersistenceError;
use crate::core::types::InstrumentId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persisted risk-tracking state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub peak_balance: f64,
    pub realized_pnl: f64,
    /// RFC3339 timestamp of the last save.
    pub last_saved: String,
    pub instrument_id: String,
}

/// Storage backend for [`StrategyState`].
pub trait StateStore: Send {
    /// `None` when nothing (valid) is persisted.
    fn load(&self) -> Option<StrategyState>;

    fn save(&self, state: &StrategyState) -> Result<(), PersistenceError>;
}

/// File-backed store under an artifacts directory.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Conventional per-instrument path:
    /// `{artifacts_dir}/strategy_state_{safe_id}.json`.
    pub fn for_instrument(artifacts_dir: impl AsRef<Path>, instrument_id: &InstrumentId) -> Self {
        let file = format!("strategy_state_{}.json", instrument_id.safe_id());
        Self {
            path: artifacts_dir.as_ref().join(file),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Option<StrategyState> {
        if !self.path.exists() {
            info!("no persisted state file found, starting fresh");
            return None;
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read persisted state");
                return None;
            }
        };
        match serde_json::from_str::<StrategyState>(&raw) {
            Ok(state) => {
                info!(
                    peak_balance = state.peak_balance,
                    realized_pnl = state.realized_pnl,
                    "restored persisted state"
                );
                Some(state)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "invalid persisted state, ignoring");
                None
            }
        }
    }

    fn save(&self, state: &StrategyState) -> Result<(), PersistenceError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        // Temp file must live in the target directory for rename atomicity.
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            let json = serde_json::to_string_pretty(state)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

/// No-op store for backtest and optimization runs.
pub struct NullStateStore;

impl StateStore for NullStateStore {
    fn load(&self) -> Option<StrategyState> {
        None
    }

    fn save(&self, _state: &StrategyState) -> Result<(), PersistenceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn state(peak: f64, pnl: f64) -> StrategyState {
        StrategyState {
            peak_balance: peak,
            realized_pnl: pnl,
            last_saved: "2026-08-01T00:00:00+00:00".to_string(),
            instrument_id: "BTCUSDT-PERP_BINANCE".to_string(),
        }
    }

    #[test]
    fn save_then_load_round_trips_exact_floats() {
        let dir = tempdir().unwrap();
        let store =
            FileStateStore::for_instrument(dir.path(), &InstrumentId::new("BTCUSDT-PERP.BINANCE"));
        store.save(&state(9999.99, -42.0)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.peak_balance, 9999.99);
        assert_eq!(loaded.realized_pnl, -42.0);
        assert_eq!(loaded.instrument_id, "BTCUSDT-PERP_BINANCE");
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nope.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn invalid_json_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strategy_state_x.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileStateStore::new(&path);
        assert!(store.load().is_none());
    }

    #[test]
    fn path_uses_safe_instrument_id() {
        let store = FileStateStore::for_instrument(
            "artifacts",
            &InstrumentId::new("ETH/USDT.BINANCE"),
        );
        assert_eq!(
            store.path(),
            Path::new("artifacts/strategy_state_ETH_USDT_BINANCE.json")
        );
    }

    #[test]
    fn overwrite_replaces_previous_state() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("s.json"));
        store.save(&state(100.0, 1.0)).unwrap();
        store.save(&state(200.0, 2.0)).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.peak_balance, 200.0);
        // No temp file left behind.
        assert!(!dir.path().join("s.json.tmp").exists());
    }

    #[test]
    fn null_store_is_inert() {
        let store = NullStateStore;
        assert!(store.load().is_none());
        store.save(&state(1.0, 1.0)).unwrap();
        assert!(store.load().is_none());
    }
}
