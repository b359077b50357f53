//! Candidate model evaluation over historical seasons

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::purged_cv::{brier_score, log_loss, purged_walk_forward_cv, CvMetrics, ValidationConfig};
use crate::data::{FeatureProvider, HistoricalMatchProvider};
use crate::error::{EngineError, Result};
use crate::models::{sort_chronologically, MatchRecord};
use crate::predictor::{ModelFactory, ProbabilityModel};

/// Smallest training set a candidate is evaluated on
pub const MIN_TRAINING_ROWS: usize = 120;

/// Chronologically ordered feature matrix with home-win labels
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub match_ids: Vec<String>,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<bool>,
}

impl TrainingSet {
    /// Rows in the given order; callers pass chronologically sorted matches
    pub fn build(matches: &[MatchRecord], features: &dyn FeatureProvider) -> Result<Self> {
        let mut set = Self::default();
        for m in matches {
            let row = features.get_features(&m.match_id)?;
            set.match_ids.push(m.match_id.clone());
            set.x.push(row.to_vector());
            set.y.push(m.home_win());
        }
        Ok(set)
    }

    /// All resolved matches of the given seasons, oldest season first
    pub fn from_history(
        history: &dyn HistoricalMatchProvider,
        features: &dyn FeatureProvider,
        seasons: &[i32],
    ) -> Result<Self> {
        let mut seasons = seasons.to_vec();
        seasons.sort_unstable();
        seasons.dedup();

        let mut matches = Vec::new();
        for season in seasons {
            let mut season_matches = history.matches_for(season, None)?;
            sort_chronologically(&mut season_matches);
            matches.extend(season_matches);
        }
        Self::build(&matches, features)
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Fit quality on the training data itself; never used for promotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InSampleDiagnostics {
    pub brier: f64,
    pub log_loss: f64,
}

/// Out-of-sample metrics plus the model refitted on the full set
#[derive(Debug, Clone)]
pub struct CandidateReport<M> {
    pub cv: CvMetrics,
    pub in_sample: InSampleDiagnostics,
    pub model: M,
}

/// Purged CV followed by a full refit
pub fn evaluate_candidate<F: ModelFactory>(
    factory: &F,
    set: &TrainingSet,
    config: &ValidationConfig,
) -> Result<CandidateReport<F::Model>> {
    if set.len() < MIN_TRAINING_ROWS {
        return Err(EngineError::Data(format!(
            "not enough training rows: {} (need {})",
            set.len(),
            MIN_TRAINING_ROWS
        )));
    }

    let cv = purged_walk_forward_cv(factory, &set.x, &set.y, config)?;
    let model = factory.fit(&set.x, &set.y)?;

    let p: Vec<f64> = set.x.iter().map(|row| model.predict_proba(row)).collect();
    let in_sample = InSampleDiagnostics {
        brier: brier_score(&set.y, &p),
        log_loss: log_loss(&set.y, &p),
    };
    debug!(
        "In-sample diagnostics (not used for promotion): brier={:.4} logloss={:.4}",
        in_sample.brier, in_sample.log_loss
    );
    info!(
        "Candidate evaluated on {} rows: cv brier={:.4} over {} folds",
        set.len(),
        cv.brier_mean,
        cv.folds.len()
    );

    Ok(CandidateReport { cv, in_sample, model })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryMatchData;
    use crate::models::FeatureRow;
    use crate::predictor::LogisticRegressionFactory;
    use chrono::NaiveDate;

    fn history(n: usize) -> InMemoryMatchData {
        let mut data = InMemoryMatchData::new();
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        // Inserted newest first to exercise ordering
        for i in (0..n).rev() {
            let home_strong = i % 3 != 0;
            let record = MatchRecord {
                match_id: format!("m{:03}", i),
                season: 2023 + (i / 100) as i32,
                round_num: (i % 100 / 4 + 1) as u32,
                match_date: start + chrono::Duration::days(i as i64),
                home_team: "Storm".to_string(),
                away_team: "Eels".to_string(),
                home_score: if home_strong { 24 } else { 10 },
                away_score: if home_strong { 12 } else { 20 },
            };
            let row = FeatureRow {
                rating_diff: if home_strong { 80.0 } else { -80.0 },
                ..Default::default()
            };
            data.insert(record, row);
        }
        data
    }

    #[test]
    fn test_training_set_chronological() {
        let data = history(150);
        let set = TrainingSet::from_history(&data, &data, &[2023, 2024]).unwrap();
        assert_eq!(set.len(), 150);
        assert_eq!(set.match_ids[0], "m000");
        assert_eq!(set.match_ids[149], "m149");
        assert_eq!(set.x[0].len(), crate::models::FEATURE_NAMES.len());
        assert!(!set.y[0]);
        assert!(set.y[1]);
    }

    #[test]
    fn test_evaluate_candidate_rejects_small_sets() {
        let data = history(100);
        let set = TrainingSet::from_history(&data, &data, &[2023]).unwrap();
        let err = evaluate_candidate(&LogisticRegressionFactory::default(), &set, &ValidationConfig::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
    }

    #[test]
    fn test_evaluate_candidate_learns_signal() {
        let data = history(300);
        let set = TrainingSet::from_history(&data, &data, &[2023, 2024, 2025]).unwrap();
        let report =
            evaluate_candidate(&LogisticRegressionFactory::default(), &set, &ValidationConfig::default()).unwrap();

        assert_eq!(report.cv.folds.len(), 5);
        assert!(report.cv.brier_mean < 0.25);
        assert!(report.in_sample.brier < 0.25);
        assert!(report.model.predict_proba(&set.x[1]) > report.model.predict_proba(&set.x[0]));
    }
}
