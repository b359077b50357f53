//! Collaborator interfaces consumed by the engine
//!
//! All reads are synchronous. Implementations report infrastructure failures
//! as errors and the engine propagates them unchanged.

use crate::core::calibration::CalibrationParams;
use crate::error::Result;
use crate::models::{FeatureRow, LabeledPrediction, MatchRecord};

/// Point-in-time features for a match. Rows must contain only information
/// knowable before kick-off and must be fully defaulted.
pub trait FeatureProvider {
    fn get_features(&self, match_id: &str) -> Result<FeatureRow>;
}

/// Optional ML probability for the home team
pub trait MlProbabilityProvider {
    /// `None` when no model is available for this row
    fn predict(&self, row: &FeatureRow) -> Option<f64>;
}

/// Resolved matches in (round_num, match_date, match_id) order
pub trait HistoricalMatchProvider {
    fn matches_for(&self, season: i32, rounds: Option<&[u32]>) -> Result<Vec<MatchRecord>>;
}

/// Stored fair probabilities with known outcomes, used to fit calibration
pub trait PredictionSource {
    fn labeled_predictions(&self, season: i32) -> Result<Vec<LabeledPrediction>>;
}

/// Per-season calibration register; the most recent fit wins
pub trait CalibrationStore {
    fn load_latest(&self, season: i32) -> Result<Option<CalibrationParams>>;
    fn persist(&self, season: i32, params: &CalibrationParams) -> Result<()>;
}
