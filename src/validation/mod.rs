//! Leakage-safe model validation

pub mod purged_cv;
pub mod training;

pub use purged_cv::{
    brier_score, log_loss, plan_folds, purged_walk_forward_cv, CvMetrics, FoldScore, FoldWindow,
    ValidationConfig,
};
pub use training::{evaluate_candidate, CandidateReport, InSampleDiagnostics, TrainingSet, MIN_TRAINING_ROWS};
