//! In-memory collaborators
//!
//! Used by tests and by the CSV loaders once data has been read.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::providers::{
    CalibrationStore, FeatureProvider, HistoricalMatchProvider, MlProbabilityProvider,
    PredictionSource,
};
use crate::core::calibration::CalibrationParams;
use crate::error::{EngineError, Result};
use crate::models::{sort_chronologically, FeatureRow, LabeledPrediction, MatchRecord};

/// Matches and their feature rows, indexed by match id
#[derive(Debug, Clone, Default)]
pub struct InMemoryMatchData {
    matches: Vec<MatchRecord>,
    features: HashMap<String, FeatureRow>,
}

impl InMemoryMatchData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: MatchRecord, features: FeatureRow) {
        self.features.insert(record.match_id.clone(), features);
        self.matches.push(record);
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Seasons present, ascending
    pub fn seasons(&self) -> Vec<i32> {
        let mut seasons: Vec<i32> = self.matches.iter().map(|m| m.season).collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }
}

impl HistoricalMatchProvider for InMemoryMatchData {
    fn matches_for(&self, season: i32, rounds: Option<&[u32]>) -> Result<Vec<MatchRecord>> {
        let mut selected: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|m| m.season == season)
            .filter(|m| rounds.map_or(true, |r| r.contains(&m.round_num)))
            .cloned()
            .collect();
        sort_chronologically(&mut selected);
        Ok(selected)
    }
}

impl FeatureProvider for InMemoryMatchData {
    fn get_features(&self, match_id: &str) -> Result<FeatureRow> {
        self.features
            .get(match_id)
            .cloned()
            .ok_or_else(|| EngineError::MatchNotFound(match_id.to_string()))
    }
}

/// Labeled predictions grouped by season
#[derive(Debug, Clone, Default)]
pub struct InMemoryPredictions {
    by_season: HashMap<i32, Vec<LabeledPrediction>>,
}

impl InMemoryPredictions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, season: i32, prediction: LabeledPrediction) {
        self.by_season.entry(season).or_default().push(prediction);
    }
}

impl PredictionSource for InMemoryPredictions {
    fn labeled_predictions(&self, season: i32) -> Result<Vec<LabeledPrediction>> {
        Ok(self.by_season.get(&season).cloned().unwrap_or_default())
    }
}

/// ML provider returning a fixed probability, or nothing
#[derive(Debug, Clone, Copy)]
pub struct ConstantMlProvider(pub Option<f64>);

impl MlProbabilityProvider for ConstantMlProvider {
    fn predict(&self, _row: &FeatureRow) -> Option<f64> {
        self.0
    }
}

/// One persisted calibration fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub version: u64,
    pub params: CalibrationParams,
}

/// Versioned per-season calibration history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationHistory {
    next_version: u64,
    seasons: BTreeMap<i32, Vec<CalibrationRecord>>,
}

impl CalibrationHistory {
    pub fn append(&mut self, season: i32, params: CalibrationParams) -> u64 {
        self.next_version += 1;
        let version = self.next_version;
        self.seasons
            .entry(season)
            .or_default()
            .push(CalibrationRecord { version, params });
        version
    }

    /// Record with the latest fit time; ties go to the later write
    pub fn latest(&self, season: i32) -> Option<&CalibrationRecord> {
        self.seasons
            .get(&season)?
            .iter()
            .max_by_key(|r| (r.params.fitted_at, r.version))
    }

    pub fn versions(&self, season: i32) -> usize {
        self.seasons.get(&season).map_or(0, Vec::len)
    }
}

/// Thread-safe in-memory calibration store
#[derive(Debug, Default)]
pub struct InMemoryCalibrationStore {
    history: RwLock<CalibrationHistory>,
}

impl InMemoryCalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fits recorded for a season
    pub fn versions(&self, season: i32) -> usize {
        self.history
            .read()
            .map(|h| h.versions(season))
            .unwrap_or(0)
    }
}

impl CalibrationStore for InMemoryCalibrationStore {
    fn load_latest(&self, season: i32) -> Result<Option<CalibrationParams>> {
        let history = self
            .history
            .read()
            .map_err(|e| EngineError::Data(format!("calibration store poisoned: {}", e)))?;
        Ok(history.latest(season).map(|r| r.params.clone()))
    }

    fn persist(&self, season: i32, params: &CalibrationParams) -> Result<()> {
        let mut history = self
            .history
            .write()
            .map_err(|e| EngineError::Data(format!("calibration store poisoned: {}", e)))?;
        history.append(season, params.clone());
        Ok(())
    }
}
