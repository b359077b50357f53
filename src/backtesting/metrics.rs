//! Backtest Metrics
//!
//! Rounded summary, per-round breakdown and Sharpe ratio over the ledger.

use super::simulator::{BacktestResult, LedgerEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Reporting view of a backtest result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub no_edge_skipped: usize,
    pub entropy_skipped: usize,
    pub edge_floor_skipped: usize,
    pub exposure_capped: usize,
    pub hit_rate_pct: f64,
    pub initial_bankroll: f64,
    pub final_bankroll: f64,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub peak_bankroll: f64,
    pub max_drawdown_pct: f64,
    pub avg_brier_score: f64,
    pub avg_clv: f64,
}

/// Money to 2 decimals, Brier to 5
pub fn summarize(result: &BacktestResult) -> BacktestSummary {
    BacktestSummary {
        total_bets: result.total_bets,
        wins: result.wins,
        losses: result.losses,
        no_edge_skipped: result.no_edge_skipped,
        entropy_skipped: result.entropy_skipped,
        edge_floor_skipped: result.edge_floor_skipped,
        exposure_capped: result.exposure_capped,
        hit_rate_pct: round_to(result.hit_rate_pct(), 2),
        initial_bankroll: round_to(result.initial_bankroll, 2),
        final_bankroll: round_to(result.final_bankroll, 2),
        total_pnl: round_to(result.total_pnl, 2),
        roi_pct: round_to(result.roi_pct(), 2),
        peak_bankroll: round_to(result.peak_bankroll, 2),
        max_drawdown_pct: round_to(result.max_drawdown * 100.0, 2),
        avg_brier_score: round_to(result.avg_brier(), 5),
        avg_clv: round_to(result.avg_clv(), 4),
    }
}

/// Sharpe ratio of per-bet returns (pnl / stake)
pub fn calculate_sharpe_ratio(ledger: &[LedgerEntry], risk_free_rate: f64) -> f64 {
    if ledger.is_empty() {
        return 0.0;
    }

    let returns: Vec<f64> = ledger
        .iter()
        .filter(|e| e.stake > 0.0)
        .map(|e| e.pnl / e.stake)
        .collect();
    if returns.is_empty() {
        return 0.0;
    }

    let mean_return: f64 = returns.iter().sum::<f64>() / returns.len() as f64;

    let variance: f64 = returns
        .iter()
        .map(|r| (r - mean_return).powi(2))
        .sum::<f64>()
        / returns.len() as f64;

    let std_return = variance.sqrt();

    if std_return == 0.0 {
        return 0.0;
    }

    (mean_return - risk_free_rate) / std_return
}

/// Results for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundAnalysis {
    pub round_num: u32,
    pub bets: usize,
    pub wins: usize,
    pub hit_rate: f64,
    pub stake: f64,
    pub pnl: f64,
    pub roi: f64,
}

/// Group ledger entries by round, ascending
pub fn analyze_by_round(ledger: &[LedgerEntry]) -> Vec<RoundAnalysis> {
    let mut grouped: BTreeMap<u32, Vec<&LedgerEntry>> = BTreeMap::new();
    for entry in ledger {
        grouped.entry(entry.round_num).or_default().push(entry);
    }

    grouped
        .into_iter()
        .map(|(round_num, group)| {
            let bets = group.len();
            let wins = group.iter().filter(|e| e.outcome.is_win()).count();
            let stake: f64 = group.iter().map(|e| e.stake).sum();
            let pnl: f64 = group.iter().map(|e| e.pnl).sum();

            RoundAnalysis {
                round_num,
                bets,
                wins,
                hit_rate: if bets > 0 {
                    wins as f64 / bets as f64
                } else {
                    0.0
                },
                stake,
                pnl,
                roi: if stake > 0.0 { pnl / stake } else { 0.0 },
            }
        })
        .collect()
}
