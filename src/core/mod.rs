//! Core decision logic: calibration, guardrails and stake sizing

pub mod calibration;
pub mod guardrails;
pub mod kelly;

// Re-export commonly used types
pub use calibration::{
    apply_calibration, beta_transform, fit_beta_calibration, CalibrationConfig, CalibrationFit,
    CalibrationParams, Calibrator,
};
pub use guardrails::{
    binary_entropy, expected_value, passes_edge_floor, passes_entropy_gate, GuardrailConfig,
    GuardrailPolicy, GuardrailVerdict, RoundExposureTracker,
};
pub use kelly::{
    apply_fractional_kelly, kelly_fraction, size_stake, SizingConfig, SizingDecision,
    SizingReason, StakeSizer,
};
