//! Engine configuration
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed with `EDGE_`, `__` between section and
//!    field (`EDGE_GUARDRAILS__MIN_EDGE=0.07`)
//! 2. Configuration file (TOML)
//! 3. Default values

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::backtesting::BacktestConfig;
use crate::core::{CalibrationConfig, GuardrailConfig, SizingConfig};
use crate::error::{validate_positive, validate_probability, EngineError, Result};
use crate::predictor::BlendConfig;
use crate::validation::ValidationConfig;

/// Every tunable of the engine, read once and passed by value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub blend: BlendConfig,
    pub sizing: SizingConfig,
    pub guardrails: GuardrailConfig,
    pub calibration: CalibrationConfig,
    pub validation: ValidationConfig,
    pub backtest: BacktestConfig,
}

impl EngineConfig {
    /// Reject values outside their meaningful ranges
    pub fn validate(&self) -> Result<()> {
        validate_probability("blend.ml_alpha", self.blend.ml_alpha)?;

        if !self.sizing.fractional_kelly.is_finite() {
            return Err(EngineError::Config(format!(
                "sizing.fractional_kelly must be finite, got {}",
                self.sizing.fractional_kelly
            )));
        }
        validate_positive("sizing.kelly_fraction_cap", self.sizing.kelly_fraction_cap)?;
        validate_positive("sizing.max_stake_frac", self.sizing.max_stake_frac)?;
        validate_probability("sizing.max_stake_frac", self.sizing.max_stake_frac)?;

        validate_positive("guardrails.max_entropy", self.guardrails.max_entropy)?;
        if !self.guardrails.min_edge.is_finite() {
            return Err(EngineError::Config(format!(
                "guardrails.min_edge must be finite, got {}",
                self.guardrails.min_edge
            )));
        }
        validate_positive(
            "guardrails.max_round_exposure_frac",
            self.guardrails.max_round_exposure_frac,
        )?;
        validate_probability(
            "guardrails.max_round_exposure_frac",
            self.guardrails.max_round_exposure_frac,
        )?;

        if self.calibration.min_samples == 0 {
            return Err(EngineError::Config(
                "calibration.min_samples must be at least 1".to_string(),
            ));
        }

        if self.validation.n_splits == 0 {
            return Err(EngineError::Config(
                "validation.n_splits must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.validation.embargo_pct) {
            return Err(EngineError::Config(format!(
                "validation.embargo_pct must be in [0, 1), got {}",
                self.validation.embargo_pct
            )));
        }

        validate_positive("backtest.initial_bankroll", self.backtest.initial_bankroll)?;
        Ok(())
    }
}

/// Load and validate configuration from an optional TOML file and the environment
pub fn load_config(config_path: Option<&Path>) -> Result<EngineConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(EngineError::Config(format!(
                "config file not found: {:?}",
                path
            )));
        }
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }

    builder = builder.add_source(
        Environment::with_prefix("EDGE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: EngineConfig = builder.build()?.try_deserialize()?;
    config.validate()?;

    debug!("Loaded engine config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.blend.ml_alpha, 0.65);
        assert_eq!(config.guardrails.max_entropy, 0.65);
        assert_eq!(config.guardrails.min_edge, 0.05);
        assert_eq!(config.guardrails.max_round_exposure_frac, 0.06);
        assert_eq!(config.sizing.max_stake_frac, 0.05);
        assert_eq!(config.calibration.min_samples, 80);
        assert_eq!(config.validation.n_splits, 5);
        assert_eq!(config.backtest.initial_bankroll, 1000.0);
    }

    #[test]
    fn test_load_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[guardrails]\nmin_edge = 0.08\n\n[validation]\nn_splits = 3\nparallel_folds = false"
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.guardrails.min_edge, 0.08);
        assert_eq!(config.guardrails.max_entropy, 0.65);
        assert_eq!(config.validation.n_splits, 3);
        assert!(!config.validation.parallel_folds);
        assert_eq!(config.blend.ml_alpha, 0.65);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = load_config(Some(Path::new("/nonexistent/engine.toml"))).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_out_of_range_file_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[blend]\nml_alpha = 1.5").unwrap();
        assert!(matches!(
            load_config(Some(file.path())),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        // Only this test touches EDGE_BACKTEST__*
        std::env::set_var("EDGE_BACKTEST__INITIAL_BANKROLL", "2500");
        let config = load_config(None);
        std::env::remove_var("EDGE_BACKTEST__INITIAL_BANKROLL");

        assert_eq!(config.unwrap().backtest.initial_bankroll, 2500.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.sizing.max_stake_frac = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.validation.embargo_pct = 1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.validation.n_splits = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.backtest.initial_bankroll = -5.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.guardrails.max_round_exposure_frac = f64::NAN;
        assert!(config.validate().is_err());
    }
}
