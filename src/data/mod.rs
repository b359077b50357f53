//! Data collaborators: provider traits, in-memory and file-backed implementations

pub mod calibration_store;
pub mod csv_loader;
pub mod memory;
pub mod providers;

// Re-export commonly used types
pub use calibration_store::JsonCalibrationStore;
pub use csv_loader::{MatchTable, PredictionTable};
pub use memory::{
    CalibrationHistory, CalibrationRecord, ConstantMlProvider, InMemoryCalibrationStore,
    InMemoryMatchData, InMemoryPredictions,
};
pub use providers::{
    CalibrationStore, FeatureProvider, HistoricalMatchProvider, MlProbabilityProvider,
    PredictionSource,
};
