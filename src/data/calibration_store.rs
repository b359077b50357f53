//! JSON-file calibration store

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::memory::CalibrationHistory;
use super::providers::CalibrationStore;
use crate::core::calibration::CalibrationParams;
use crate::error::{EngineError, Result};

/// Calibration history persisted as a single JSON document.
///
/// A missing file is an empty store. Every `persist` rewrites the file.
pub struct JsonCalibrationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonCalibrationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_history(&self) -> Result<CalibrationHistory> {
        if !self.path.exists() {
            return Ok(CalibrationHistory::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_history(&self, history: &CalibrationHistory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(history)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CalibrationStore for JsonCalibrationStore {
    fn load_latest(&self, season: i32) -> Result<Option<CalibrationParams>> {
        let history = self.read_history()?;
        Ok(history.latest(season).map(|r| r.params.clone()))
    }

    fn persist(&self, season: i32, params: &CalibrationParams) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| EngineError::Data(format!("calibration store poisoned: {}", e)))?;
        let mut history = self.read_history()?;
        let version = history.append(season, params.clone());
        self.write_history(&history)?;
        debug!("Persisted calibration S{} v{} to {:?}", season, version, self.path);
        Ok(())
    }
}
