//! Beta Probability Calibration
//!
//! Remaps a raw probability onto an empirically calibrated one with a
//! two-parameter beta-shaped transform:
//!
//! ```text
//! T(p; a, b) = p^a / (p^a + (1-p)^b)
//! ```
//!
//! (a, b) = (1, 1) is the identity. Parameters are fit per season by
//! minimizing the Brier loss of the transformed probabilities over labeled
//! predictions, within the box [0.01, 10]².

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::CalibrationStore;
use crate::error::Result;
use crate::models::LabeledPrediction;

/// Probabilities are clamped to [EPS, 1-EPS] before the power transform
pub const CALIBRATION_EPS: f64 = 1e-6;
/// Lower bound for a and b
pub const PARAM_MIN: f64 = 0.01;
/// Upper bound for a and b
pub const PARAM_MAX: f64 = 10.0;

const MAX_ITERATIONS: usize = 500;
const ARMIJO_C: f64 = 1e-4;
const STEP_TOLERANCE: f64 = 1e-10;
const LOSS_TOLERANCE: f64 = 1e-14;

/// Calibration fitting parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Minimum labeled predictions required to fit
    pub min_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self { min_samples: 80 }
    }
}

/// Fitted beta calibration for one season
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub season: i32,
    pub a: f64,
    pub b: f64,
    /// Brier loss achieved on the fitting sample
    pub brier_loss: f64,
    /// Season whose predictions the fit used
    pub fitted_on: i32,
    pub n_samples: usize,
    pub fitted_at: DateTime<Utc>,
}

impl CalibrationParams {
    /// Finite parameters within the fitting bounds
    pub fn is_well_formed(&self) -> bool {
        let in_bounds = |v: f64| v.is_finite() && (PARAM_MIN..=PARAM_MAX).contains(&v);
        in_bounds(self.a) && in_bounds(self.b)
    }
}

/// Result of a fit attempt
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationFit {
    Fitted(CalibrationParams),
    /// Not enough labeled predictions; nothing was fit
    Insufficient { samples: usize, required: usize },
}

impl CalibrationFit {
    pub fn params(&self) -> Option<&CalibrationParams> {
        match self {
            CalibrationFit::Fitted(params) => Some(params),
            CalibrationFit::Insufficient { .. } => None,
        }
    }
}

fn clamp_probability(p: f64) -> f64 {
    p.clamp(CALIBRATION_EPS, 1.0 - CALIBRATION_EPS)
}

/// Beta transform on a clamped probability
pub fn beta_transform(p: f64, a: f64, b: f64) -> f64 {
    let p = clamp_probability(p);
    let num = p.powf(a);
    num / (num + (1.0 - p).powf(b))
}

/// Apply fitted calibration, falling back to the raw probability when the
/// parameters are missing or malformed
pub fn apply_calibration(p_fair: f64, params: Option<&CalibrationParams>) -> f64 {
    match params {
        Some(params) if params.is_well_formed() => {
            beta_transform(p_fair, params.a, params.b).clamp(0.0, 1.0)
        }
        _ => p_fair,
    }
}

/// Mean squared error of the transformed probabilities and its gradient in (a, b)
fn brier_loss_and_gradient(samples: &[(f64, f64)], a: f64, b: f64) -> (f64, [f64; 2]) {
    let n = samples.len() as f64;
    let mut loss = 0.0;
    let mut grad = [0.0; 2];

    for &(p, y) in samples {
        let t = beta_transform(p, a, b);
        let residual = t - y;
        let slope = t * (1.0 - t);
        loss += residual * residual;
        // dT/da = T(1-T) ln p, dT/db = -T(1-T) ln(1-p)
        grad[0] += 2.0 * residual * slope * p.ln();
        grad[1] -= 2.0 * residual * slope * (1.0 - p).ln();
    }

    (loss / n, [grad[0] / n, grad[1] / n])
}

fn project(x: [f64; 2]) -> [f64; 2] {
    [x[0].clamp(PARAM_MIN, PARAM_MAX), x[1].clamp(PARAM_MIN, PARAM_MAX)]
}

/// Projected gradient descent with Armijo backtracking inside [0.01, 10]²,
/// seeded at the identity transform
fn minimize_brier(samples: &[(f64, f64)]) -> ([f64; 2], f64) {
    let mut x = [1.0, 1.0];
    let (mut loss, mut grad) = brier_loss_and_gradient(samples, x[0], x[1]);
    let mut step: f64 = 1.0;

    for iteration in 0..MAX_ITERATIONS {
        step = (step * 4.0).min(1e4);
        let mut accepted = None;

        while step > STEP_TOLERANCE {
            let candidate = project([x[0] - step * grad[0], x[1] - step * grad[1]]);
            let moved = [x[0] - candidate[0], x[1] - candidate[1]];
            let decrease = grad[0] * moved[0] + grad[1] * moved[1];
            let (candidate_loss, candidate_grad) =
                brier_loss_and_gradient(samples, candidate[0], candidate[1]);

            if candidate_loss <= loss - ARMIJO_C * decrease {
                accepted = Some((candidate, candidate_loss, candidate_grad, moved));
                break;
            }
            step *= 0.5;
        }

        let Some((candidate, candidate_loss, candidate_grad, moved)) = accepted else {
            debug!(iteration, "calibration optimizer: no descent step");
            break;
        };

        let improvement = loss - candidate_loss;
        x = candidate;
        loss = candidate_loss;
        grad = candidate_grad;

        if moved[0].abs().max(moved[1].abs()) < STEP_TOLERANCE || improvement < LOSS_TOLERANCE {
            debug!(iteration, "calibration optimizer converged");
            break;
        }
    }

    (x, loss)
}

/// Fit beta calibration on labeled predictions for a season
pub fn fit_beta_calibration(
    season: i32,
    samples: &[LabeledPrediction],
    min_samples: usize,
) -> CalibrationFit {
    let pairs: Vec<(f64, f64)> = samples
        .iter()
        .filter(|s| s.p_fair.is_finite())
        .map(|s| (clamp_probability(s.p_fair), if s.home_win { 1.0 } else { 0.0 }))
        .collect();

    let dropped = samples.len() - pairs.len();
    if dropped > 0 {
        warn!("Ignoring {} non-finite predictions for S{}", dropped, season);
    }

    if pairs.len() < min_samples {
        info!(
            "Calibration skipped for S{} - only {} samples (need {})",
            season,
            pairs.len(),
            min_samples
        );
        return CalibrationFit::Insufficient {
            samples: pairs.len(),
            required: min_samples,
        };
    }

    let ([a, b], brier_loss) = minimize_brier(&pairs);

    info!(
        "Beta calibration fitted for S{}: a={:.3} b={:.3} (Brier={:.4})",
        season, a, b, brier_loss
    );

    CalibrationFit::Fitted(CalibrationParams {
        season,
        a,
        b,
        brier_loss,
        fitted_on: season,
        n_samples: pairs.len(),
        fitted_at: Utc::now(),
    })
}

/// Fits, persists and loads season calibrations through a store
pub struct Calibrator<'a> {
    config: CalibrationConfig,
    store: &'a dyn CalibrationStore,
}

impl<'a> Calibrator<'a> {
    pub fn new(config: CalibrationConfig, store: &'a dyn CalibrationStore) -> Self {
        Self { config, store }
    }

    /// Fit a season and persist the result. Insufficient data persists nothing.
    pub fn fit(&self, season: i32, samples: &[LabeledPrediction]) -> Result<CalibrationFit> {
        let fit = fit_beta_calibration(season, samples, self.config.min_samples);
        if let CalibrationFit::Fitted(ref params) = fit {
            self.store.persist(season, params)?;
        }
        Ok(fit)
    }

    pub fn load_latest(&self, season: i32) -> Result<Option<CalibrationParams>> {
        let params = self.store.load_latest(season)?;
        if let Some(ref p) = params {
            if !p.is_well_formed() {
                warn!(
                    "Stored calibration for S{} is malformed (a={}, b={}); raw probabilities will be used",
                    season, p.a, p.b
                );
            }
        }
        Ok(params)
    }

    /// Calibrate a probability with the season's latest parameters
    pub fn calibrate(&self, season: i32, p_fair: f64) -> Result<f64> {
        let params = self.load_latest(season)?;
        Ok(apply_calibration(p_fair, params.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryCalibrationStore;

    fn separating_samples(n: usize) -> Vec<LabeledPrediction> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    LabeledPrediction::new(0.7, true)
                } else {
                    LabeledPrediction::new(0.3, false)
                }
            })
            .collect()
    }

    fn params(a: f64, b: f64) -> CalibrationParams {
        CalibrationParams {
            season: 2025,
            a,
            b,
            brier_loss: 0.2,
            fitted_on: 2025,
            n_samples: 100,
            fitted_at: Utc::now(),
        }
    }

    #[test]
    fn test_beta_transform_identity() {
        for &p in &[0.1, 0.25, 0.5, 0.75, 0.9] {
            assert!((beta_transform(p, 1.0, 1.0) - p).abs() < 1e-12);
        }
    }

    #[test]
    fn test_beta_transform_clamps_extremes() {
        let low = beta_transform(0.0, 2.0, 2.0);
        let high = beta_transform(1.0, 2.0, 2.0);
        assert!(low > 0.0 && low < 1e-6);
        assert!(high < 1.0 && high > 1.0 - 1e-6);
    }

    #[test]
    fn test_apply_calibration_without_params() {
        assert_eq!(apply_calibration(0.42, None), 0.42);
        for i in 0..=20 {
            let p = i as f64 / 20.0;
            assert_eq!(apply_calibration(p, None), p);
        }
    }

    #[test]
    fn test_apply_calibration_malformed_params() {
        assert_eq!(apply_calibration(0.42, Some(&params(f64::NAN, 1.0))), 0.42);
        assert_eq!(apply_calibration(0.42, Some(&params(1.0, 0.0))), 0.42);
        assert_eq!(apply_calibration(0.42, Some(&params(25.0, 1.0))), 0.42);
    }

    #[test]
    fn test_apply_calibration_in_unit_interval() {
        let grid = [PARAM_MIN, 0.1, 0.5, 1.0, 3.0, PARAM_MAX];
        for &a in &grid {
            for &b in &grid {
                let params = params(a, b);
                for i in 0..=50 {
                    let p = i as f64 / 50.0;
                    let out = apply_calibration(p, Some(&params));
                    assert!((0.0..=1.0).contains(&out), "a={} b={} p={} out={}", a, b, p, out);
                }
            }
        }
    }

    #[test]
    fn test_fit_insufficient_samples() {
        let fit = fit_beta_calibration(2025, &separating_samples(79), 80);
        assert_eq!(
            fit,
            CalibrationFit::Insufficient {
                samples: 79,
                required: 80
            }
        );
        assert!(fit.params().is_none());
    }

    #[test]
    fn test_fit_separating_samples() {
        let fit = fit_beta_calibration(2026, &separating_samples(120), 80);
        let params = fit.params().expect("fit should succeed");

        assert!(params.a > 1.0);
        assert!(params.b > 1.0);
        assert!(params.brier_loss < 0.05, "loss {}", params.brier_loss);
        assert!(params.is_well_formed());
        assert_eq!(params.n_samples, 120);
        assert!(apply_calibration(0.7, Some(params)) > 0.9);
        assert!(apply_calibration(0.3, Some(params)) < 0.1);
    }

    #[test]
    fn test_fit_ignores_non_finite_predictions() {
        let mut samples = separating_samples(79);
        samples.push(LabeledPrediction::new(f64::NAN, true));
        samples.push(LabeledPrediction::new(f64::INFINITY, false));
        assert_eq!(
            fit_beta_calibration(2025, &samples, 80),
            CalibrationFit::Insufficient {
                samples: 79,
                required: 80
            }
        );

        let mut samples = separating_samples(100);
        samples.push(LabeledPrediction::new(f64::NAN, true));
        let fit = fit_beta_calibration(2025, &samples, 80);
        let params = fit.params().unwrap();
        assert_eq!(params.n_samples, 100);
        assert!(params.brier_loss.is_finite());
        assert!(params.a > 1.0 && params.b > 1.0);
    }

    #[test]
    fn test_fit_calibrated_data_stays_near_identity() {
        // Outcomes match the stated probabilities exactly: 3/10 wins at 0.3, 7/10 at 0.7
        let mut samples = Vec::new();
        for i in 0..100 {
            samples.push(LabeledPrediction::new(0.3, i % 10 < 3));
            samples.push(LabeledPrediction::new(0.7, i % 10 < 7));
        }
        let fit = fit_beta_calibration(2025, &samples, 80);
        let params = fit.params().unwrap();
        assert!((apply_calibration(0.3, Some(params)) - 0.3).abs() < 0.02);
        assert!((apply_calibration(0.7, Some(params)) - 0.7).abs() < 0.02);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let pairs = vec![(0.7, 1.0), (0.3, 0.0), (0.6, 0.0), (0.2, 1.0)];
        let (a, b) = (1.3, 0.8);
        let h = 1e-6;
        let (_, grad) = brier_loss_and_gradient(&pairs, a, b);
        let fd_a = (brier_loss_and_gradient(&pairs, a + h, b).0
            - brier_loss_and_gradient(&pairs, a - h, b).0)
            / (2.0 * h);
        let fd_b = (brier_loss_and_gradient(&pairs, a, b + h).0
            - brier_loss_and_gradient(&pairs, a, b - h).0)
            / (2.0 * h);
        assert!((grad[0] - fd_a).abs() < 1e-6);
        assert!((grad[1] - fd_b).abs() < 1e-6);
    }

    #[test]
    fn test_calibrator_fit_persists_and_loads() {
        let store = InMemoryCalibrationStore::new();
        let calibrator = Calibrator::new(CalibrationConfig::default(), &store);

        let fit = calibrator.fit(2026, &separating_samples(120)).unwrap();
        let fitted = fit.params().unwrap().clone();

        let loaded = calibrator.load_latest(2026).unwrap();
        assert_eq!(loaded, Some(fitted));
        assert!(calibrator.calibrate(2026, 0.7).unwrap() > 0.9);
    }

    #[test]
    fn test_calibrator_insufficient_persists_nothing() {
        let store = InMemoryCalibrationStore::new();
        let calibrator = Calibrator::new(CalibrationConfig::default(), &store);

        let fit = calibrator.fit(2026, &separating_samples(10)).unwrap();
        assert!(fit.params().is_none());
        assert_eq!(calibrator.load_latest(2026).unwrap(), None);
        assert_eq!(calibrator.calibrate(2026, 0.61).unwrap(), 0.61);
    }
}
