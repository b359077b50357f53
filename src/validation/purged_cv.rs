//! Purged Walk-Forward Cross-Validation
//!
//! Expanding-window CV over chronologically ordered rows. Every fold trains
//! on `[0, train_end)`, skips an embargo gap `[train_end, test_start)` and
//! tests on `[test_start, test_end)`. Training always starts at row 0 so no
//! left-side purge is needed; the embargo stops trailing rolling-window
//! features from leaking into the adjacent test fold.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::LN_2;
use std::ops::Range;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::predictor::{ModelFactory, ProbabilityModel};

/// Folds with fewer training rows are skipped
pub const MIN_TRAIN_SIZE: usize = 30;
/// Folds with fewer test rows are skipped
pub const MIN_TEST_SIZE: usize = 5;
/// Predictions are clipped to [CLIP, 1-CLIP] before scoring
pub const PREDICTION_CLIP: f64 = 1e-15;

/// Cross-validation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub n_splits: usize,
    pub embargo_pct: f64,
    /// Evaluate folds concurrently on the rayon pool
    pub parallel_folds: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            n_splits: 5,
            embargo_pct: 0.02,
            parallel_folds: true,
        }
    }
}

/// Index layout of one viable fold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldWindow {
    pub fold: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl FoldWindow {
    pub fn train(&self) -> Range<usize> {
        0..self.train_end
    }

    pub fn embargo(&self) -> Range<usize> {
        self.train_end..self.test_start
    }

    pub fn test(&self) -> Range<usize> {
        self.test_start..self.test_end
    }
}

/// Embargo gap in rows: at least one
pub fn embargo_size(n: usize, embargo_pct: f64) -> usize {
    ((n as f64 * embargo_pct).floor() as usize).max(1)
}

/// Viable fold windows for `n` rows
pub fn plan_folds(n: usize, n_splits: usize, embargo_pct: f64) -> Vec<FoldWindow> {
    let fold_size = n / (n_splits + 1);
    let embargo = embargo_size(n, embargo_pct);

    (0..n_splits)
        .filter_map(|fold| {
            let train_end = fold_size * (fold + 1);
            let test_start = train_end + embargo;
            let test_end = (train_end + fold_size + embargo).min(n);

            if test_start >= n || test_start >= test_end {
                return None;
            }
            if train_end < MIN_TRAIN_SIZE || test_end - test_start < MIN_TEST_SIZE {
                return None;
            }

            Some(FoldWindow {
                fold,
                train_end,
                test_start,
                test_end,
            })
        })
        .collect()
}

fn clip(p: f64) -> f64 {
    p.clamp(PREDICTION_CLIP, 1.0 - PREDICTION_CLIP)
}

fn target(y: bool) -> f64 {
    if y {
        1.0
    } else {
        0.0
    }
}

/// Mean squared error between probabilities and binary outcomes
pub fn brier_score(y: &[bool], p: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter()
        .zip(p)
        .map(|(&y, &p)| (p - target(y)).powi(2))
        .sum::<f64>()
        / y.len() as f64
}

/// Mean negative log-likelihood of binary outcomes (probabilities clipped)
pub fn log_loss(y: &[bool], p: &[f64]) -> f64 {
    if y.is_empty() {
        return 0.0;
    }
    y.iter()
        .zip(p)
        .map(|(&y, &p)| {
            let p = clip(p);
            if y {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum::<f64>()
        / y.len() as f64
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Out-of-sample score of one fold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub window: FoldWindow,
    pub brier: f64,
    pub log_loss: f64,
}

/// Aggregated out-of-sample metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvMetrics {
    pub brier_mean: f64,
    pub brier_std: f64,
    pub logloss_mean: f64,
    pub logloss_std: f64,
    pub folds: Vec<FoldScore>,
}

impl CvMetrics {
    /// Score of an uninformative always-0.5 predictor, used when no fold is viable
    pub fn fallback() -> Self {
        Self {
            brier_mean: 0.25,
            brier_std: 0.0,
            logloss_mean: LN_2,
            logloss_std: 0.0,
            folds: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.folds.is_empty()
    }

    fn from_folds(folds: Vec<FoldScore>) -> Self {
        let briers: Vec<f64> = folds.iter().map(|f| f.brier).collect();
        let losses: Vec<f64> = folds.iter().map(|f| f.log_loss).collect();
        let (brier_mean, brier_std) = mean_std(&briers);
        let (logloss_mean, logloss_std) = mean_std(&losses);
        Self {
            brier_mean,
            brier_std,
            logloss_mean,
            logloss_std,
            folds,
        }
    }
}

fn evaluate_fold<F: ModelFactory>(
    factory: &F,
    x: &[Vec<f64>],
    y: &[bool],
    window: FoldWindow,
) -> Result<FoldScore> {
    let model = factory.fit(&x[window.train()], &y[window.train()])?;

    let test_x = &x[window.test()];
    let test_y = &y[window.test()];
    let p: Vec<f64> = test_x.iter().map(|row| clip(model.predict_proba(row))).collect();

    let score = FoldScore {
        window,
        brier: brier_score(test_y, &p),
        log_loss: log_loss(test_y, &p),
    };
    debug!(
        "CV fold {}: train=[0,{}) test=[{},{}) brier={:.4} logloss={:.4}",
        window.fold, window.train_end, window.test_start, window.test_end, score.brier, score.log_loss
    );
    Ok(score)
}

/// Purged walk-forward CV of a model factory over chronologically ordered rows.
///
/// Returns [`CvMetrics::fallback`] when no fold is viable. Model fitting
/// failures propagate.
pub fn purged_walk_forward_cv<F: ModelFactory>(
    factory: &F,
    x: &[Vec<f64>],
    y: &[bool],
    config: &ValidationConfig,
) -> Result<CvMetrics> {
    if x.len() != y.len() {
        return Err(EngineError::Data(format!(
            "feature rows ({}) and labels ({}) differ in length",
            x.len(),
            y.len()
        )));
    }

    let windows = plan_folds(x.len(), config.n_splits, config.embargo_pct);
    if windows.is_empty() {
        warn!(
            "No viable CV folds for {} rows ({} splits); using uninformative fallback metrics",
            x.len(),
            config.n_splits
        );
        return Ok(CvMetrics::fallback());
    }

    let folds: Vec<FoldScore> = if config.parallel_folds {
        windows
            .par_iter()
            .map(|&w| evaluate_fold(factory, x, y, w))
            .collect::<Result<_>>()?
    } else {
        windows
            .iter()
            .map(|&w| evaluate_fold(factory, x, y, w))
            .collect::<Result<_>>()?
    };

    let metrics = CvMetrics::from_folds(folds);
    info!(
        "Purged CV over {} folds: brier={:.4}±{:.4} logloss={:.4}±{:.4}",
        metrics.folds.len(),
        metrics.brier_mean,
        metrics.brier_std,
        metrics.logloss_mean,
        metrics.logloss_std
    );
    Ok(metrics)
}
