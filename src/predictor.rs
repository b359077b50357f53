use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{apply_calibration, CalibrationParams};
use crate::data::MlProbabilityProvider;
use crate::error::{EngineError, Result};
use crate::models::{FeatureRow, Prediction};

/// Clip range applied to heuristic and ML probabilities
const PROB_FLOOR: f64 = 0.01;
const PROB_CEIL: f64 = 0.99;

/// Blend parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Weight of the ML probability when one is available
    pub ml_alpha: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self { ml_alpha: 0.65 }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Logistic baseline on rating differential with injury, rest and form adjustments
pub fn heuristic_probability(row: &FeatureRow) -> f64 {
    let injuries = row.home_injuries - row.away_injuries;
    let rest = row.home_rest_days - row.away_rest_days;
    let form = row.home_form - row.away_form;

    let x = row.rating_diff / 200.0 - 0.08 * injuries + 0.04 * rest + 0.9 * form;
    sigmoid(x).clamp(PROB_FLOOR, PROB_CEIL)
}

/// `alpha * p_ml + (1 - alpha) * p_heuristic`, or the heuristic alone
pub fn blend(p_heuristic: f64, p_ml: Option<f64>, alpha: f64) -> f64 {
    match p_ml {
        Some(p_ml) => alpha * p_ml + (1.0 - alpha) * p_heuristic,
        None => p_heuristic,
    }
}

/// Heuristic and optional ML estimates for one feature row, before calibration
pub fn predict_uncalibrated(
    row: &FeatureRow,
    ml: Option<&dyn MlProbabilityProvider>,
    config: &BlendConfig,
) -> Prediction {
    let p_heuristic = heuristic_probability(row);
    let p_ml = ml.and_then(|m| m.predict(row));
    let p_blend = blend(p_heuristic, p_ml, config.ml_alpha);

    Prediction {
        p_heuristic,
        p_ml,
        p_blend,
        p_calibrated: p_blend,
    }
}

/// Full prediction for one feature row; `p_calibrated` falls back to the
/// blend when no usable calibration is given
pub fn predict(
    row: &FeatureRow,
    ml: Option<&dyn MlProbabilityProvider>,
    config: &BlendConfig,
    calibration: Option<&CalibrationParams>,
) -> Prediction {
    let mut prediction = predict_uncalibrated(row, ml, config);
    prediction.p_calibrated = apply_calibration(prediction.p_blend, calibration);
    prediction
}

/// A fitted binary probability model
pub trait ProbabilityModel: Send + Sync {
    /// Probability of the positive class for one feature vector
    fn predict_proba(&self, features: &[f64]) -> f64;
}

/// Fits a fresh model from an immutable training slice.
///
/// `Sync` so independent folds can be fitted concurrently.
pub trait ModelFactory: Sync {
    type Model: ProbabilityModel;

    fn fit(&self, x: &[Vec<f64>], y: &[bool]) -> Result<Self::Model>;
}

/// Adapts a fitted model into an ML probability provider
pub struct ModelProvider<M: ProbabilityModel> {
    model: M,
}

impl<M: ProbabilityModel> ModelProvider<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }
}

impl<M: ProbabilityModel> MlProbabilityProvider for ModelProvider<M> {
    fn predict(&self, row: &FeatureRow) -> Option<f64> {
        let p = self.model.predict_proba(&row.to_vector());
        if p.is_finite() {
            Some(p.clamp(PROB_FLOOR, PROB_CEIL))
        } else {
            None
        }
    }
}

/// L2-regularized logistic regression trained by batch gradient descent
/// on standardized features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionFactory {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticRegressionFactory {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 300,
            l2: 1e-3,
        }
    }
}

/// Fitted logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    fn standardize<'a>(&'a self, features: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        features
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(x, (m, s))| (x - m) / s)
    }
}

impl ProbabilityModel for LogisticModel {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        let z: f64 = self
            .standardize(features)
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }
}

impl ModelFactory for LogisticRegressionFactory {
    type Model = LogisticModel;

    fn fit(&self, x: &[Vec<f64>], y: &[bool]) -> Result<LogisticModel> {
        if x.is_empty() || x.len() != y.len() {
            return Err(EngineError::Model(format!(
                "training set needs matching non-empty rows and labels (rows={}, labels={})",
                x.len(),
                y.len()
            )));
        }

        let n = x.len() as f64;
        let dim = x[0].len();
        if x.iter().any(|row| row.len() != dim) {
            return Err(EngineError::Model("ragged feature matrix".to_string()));
        }

        let mut means = vec![0.0; dim];
        for row in x {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut scales = vec![0.0; dim];
        for row in x {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        for s in scales.iter_mut() {
            // Constant columns are left unscaled
            *s = if *s > 1e-12 { s.sqrt() } else { 1.0 };
        }

        let standardized: Vec<Vec<f64>> = x
            .iter()
            .map(|row| {
                row.iter()
                    .zip(means.iter().zip(&scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect();
        let targets: Vec<f64> = y.iter().map(|&t| if t { 1.0 } else { 0.0 }).collect();

        let mut weights = vec![0.0; dim];
        let mut bias = 0.0;

        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0; dim];
            let mut grad_b = 0.0;

            for (row, target) in standardized.iter().zip(&targets) {
                let z: f64 = row.iter().zip(&weights).map(|(v, w)| v * w).sum::<f64>() + bias;
                let err = sigmoid(z) - target;
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v / n;
                }
                grad_b += err / n;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * (g + self.l2 * *w);
            }
            bias -= self.learning_rate * grad_b;
        }

        debug!("Fitted logistic model on {} rows x {} features", x.len(), dim);

        Ok(LogisticModel {
            means,
            scales,
            weights,
            bias,
        })
    }
}
