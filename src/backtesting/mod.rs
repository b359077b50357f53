//! Sequential backtesting of the betting policy

pub mod metrics;
pub mod simulator;

pub use metrics::{analyze_by_round, calculate_sharpe_ratio, summarize, BacktestSummary, RoundAnalysis};
pub use simulator::{BacktestConfig, BacktestEngine, BacktestResult, BacktestSources, LedgerEntry};
