//! NRL Edge - risk-adjusted decision and validation engine
//!
//! This library provides:
//! - Beta calibration of blended win probabilities, fitted per season
//! - Purged walk-forward cross-validation with an embargo gap
//! - Entropy gate, edge floor and per-round exposure guardrails
//! - Fractional-Kelly stake sizing with a heat cap
//! - A sequential backtest over a season's resolved matches
//!
//! # Example
//!
//! ```no_run
//! use nrl_edge::backtesting::{BacktestEngine, BacktestSources};
//! use nrl_edge::config::EngineConfig;
//! use nrl_edge::data::{InMemoryCalibrationStore, MatchTable};
//!
//! let table = MatchTable::load("data/matches.csv").unwrap();
//! let store = InMemoryCalibrationStore::new();
//! let sources = BacktestSources {
//!     matches: &table,
//!     features: &table,
//!     ml: None,
//!     calibration: &store,
//! };
//!
//! let engine = BacktestEngine::new(EngineConfig::default());
//! let result = engine.run(2025, None, &sources).unwrap();
//! println!("ROI: {:.2}%", result.roi_pct());
//! ```

pub mod backtesting;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod models;
pub mod predictor;
pub mod registry;
pub mod validation;

// Re-export commonly used types
pub use backtesting::{BacktestEngine, BacktestResult, BacktestSources, BacktestSummary, LedgerEntry};
pub use config::{load_config, EngineConfig};
pub use error::{EngineError, Result};
pub use models::{BetOutcome, FeatureRow, LabeledPrediction, MatchRecord, Prediction};
pub use registry::ModelRegistry;
