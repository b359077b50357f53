//! Backtest Engine
//!
//! Replays a season's resolved matches in chronological order, betting the
//! home side when the calibrated probability clears the guardrails, and
//! tracks the resulting bankroll trajectory.

use super::metrics::{summarize, BacktestSummary};
use crate::config::EngineConfig;
use crate::core::calibration::Calibrator;
use crate::core::guardrails::{GuardrailPolicy, GuardrailVerdict};
use crate::core::kelly::StakeSizer;
use crate::data::{CalibrationStore, FeatureProvider, HistoricalMatchProvider, MlProbabilityProvider};
use crate::error::Result;
use crate::models::{sort_chronologically, BetOutcome, MatchRecord};
use crate::predictor::predict;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Backtest parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_bankroll: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: 1000.0,
        }
    }
}

/// One placed bet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub match_id: String,
    pub round_num: u32,
    pub home_team: String,
    pub away_team: String,
    pub p_cal: f64,
    pub odds: f64,
    pub close_price: f64,
    /// Closing price minus odds taken
    pub clv: f64,
    pub stake: f64,
    pub outcome: BetOutcome,
    pub pnl: f64,
    /// Bankroll after settlement
    pub bankroll: f64,
}

/// Backtest result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    /// Every match that did not produce a bet, whatever the reason
    pub no_edge_skipped: usize,
    pub entropy_skipped: usize,
    pub edge_floor_skipped: usize,
    pub exposure_capped: usize,
    pub initial_bankroll: f64,
    pub final_bankroll: f64,
    pub peak_bankroll: f64,
    /// Largest peak-to-trough decline as a fraction of the peak
    pub max_drawdown: f64,
    pub total_staked: f64,
    pub total_pnl: f64,
    /// One entry per match, bet or not
    pub brier_scores: Vec<f64>,
    pub ledger: Vec<LedgerEntry>,
}

impl BacktestResult {
    pub fn new(initial_bankroll: f64) -> Self {
        Self {
            total_bets: 0,
            wins: 0,
            losses: 0,
            no_edge_skipped: 0,
            entropy_skipped: 0,
            edge_floor_skipped: 0,
            exposure_capped: 0,
            initial_bankroll,
            final_bankroll: initial_bankroll,
            peak_bankroll: initial_bankroll,
            max_drawdown: 0.0,
            total_staked: 0.0,
            total_pnl: 0.0,
            brier_scores: Vec::new(),
            ledger: Vec::new(),
        }
    }

    pub fn roi_pct(&self) -> f64 {
        if self.total_staked > 0.0 {
            self.total_pnl / self.total_staked * 100.0
        } else {
            0.0
        }
    }

    pub fn hit_rate_pct(&self) -> f64 {
        if self.total_bets > 0 {
            self.wins as f64 / self.total_bets as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn avg_brier(&self) -> f64 {
        if self.brier_scores.is_empty() {
            0.0
        } else {
            self.brier_scores.iter().sum::<f64>() / self.brier_scores.len() as f64
        }
    }

    pub fn avg_clv(&self) -> f64 {
        if self.ledger.is_empty() {
            0.0
        } else {
            self.ledger.iter().map(|e| e.clv).sum::<f64>() / self.ledger.len() as f64
        }
    }

    pub fn summary(&self) -> BacktestSummary {
        summarize(self)
    }

    fn settle(&mut self, bankroll: f64) {
        if bankroll > self.peak_bankroll {
            self.peak_bankroll = bankroll;
        }
        if self.peak_bankroll > 0.0 {
            let drawdown = (self.peak_bankroll - bankroll) / self.peak_bankroll;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        self.final_bankroll = bankroll;
    }
}

/// External reads a backtest run depends on
#[derive(Clone, Copy)]
pub struct BacktestSources<'a> {
    pub matches: &'a dyn HistoricalMatchProvider,
    pub features: &'a dyn FeatureProvider,
    /// Absent or unavailable estimates fall back to the heuristic alone
    pub ml: Option<&'a dyn MlProbabilityProvider>,
    pub calibration: &'a dyn CalibrationStore,
}

/// Sequential backtest over one season
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    config: EngineConfig,
    policy: GuardrailPolicy,
    sizer: StakeSizer,
}

impl BacktestEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            policy: GuardrailPolicy::new(config.guardrails),
            sizer: StakeSizer::new(config.sizing),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run over the season's resolved matches, optionally restricted to rounds
    pub fn run(
        &self,
        season: i32,
        rounds: Option<&[u32]>,
        sources: &BacktestSources<'_>,
    ) -> Result<BacktestResult> {
        let matches = sources.matches.matches_for(season, rounds)?;
        self.run_matches(season, matches, sources)
    }

    /// Run over an explicit match list; matches are replayed in
    /// (round_num, match_date, match_id) order regardless of input order
    pub fn run_matches(
        &self,
        season: i32,
        mut matches: Vec<MatchRecord>,
        sources: &BacktestSources<'_>,
    ) -> Result<BacktestResult> {
        let initial_bankroll = self.config.backtest.initial_bankroll;

        if matches.is_empty() {
            warn!("No resolved matches for backtest season={}", season);
            return Ok(BacktestResult::new(initial_bankroll));
        }
        sort_chronologically(&mut matches);

        let calibration = Calibrator::new(self.config.calibration, sources.calibration).load_latest(season)?;
        if calibration.is_none() {
            info!("No calibration stored for S{}; using blended probabilities", season);
        }

        let mut result = BacktestResult::new(initial_bankroll);
        let mut bankroll = initial_bankroll;
        let mut exposure = self.policy.exposure_tracker(initial_bankroll);

        for m in &matches {
            let row = sources.features.get_features(&m.match_id)?;
            let prediction = predict(&row, sources.ml, &self.config.blend, calibration.as_ref());
            let p_cal = prediction.p_calibrated;

            let home_win = m.home_win();
            let target = if home_win { 1.0 } else { 0.0 };
            result.brier_scores.push((p_cal - target).powi(2));

            let odds = row.odds_taken;
            if odds <= 1.0 {
                result.no_edge_skipped += 1;
                continue;
            }

            let ev = p_cal * odds - 1.0;
            match self.policy.check(p_cal, ev) {
                GuardrailVerdict::EntropyGate => {
                    result.entropy_skipped += 1;
                    result.no_edge_skipped += 1;
                    continue;
                }
                GuardrailVerdict::EdgeFloor => {
                    result.edge_floor_skipped += 1;
                    result.no_edge_skipped += 1;
                    continue;
                }
                GuardrailVerdict::Pass => {}
            }

            let sizing = self.sizer.size(bankroll, p_cal, odds);
            if sizing.stake <= 0.0 {
                result.no_edge_skipped += 1;
                continue;
            }

            let stake = exposure.clamp_stake(m.round_num, sizing.stake);
            if stake <= 0.0 {
                result.exposure_capped += 1;
                result.no_edge_skipped += 1;
                continue;
            }
            exposure.record(m.round_num, stake);

            result.total_bets += 1;
            result.total_staked += stake;

            let outcome = BetOutcome::from_home_win(home_win);
            let pnl = if outcome.is_win() {
                result.wins += 1;
                stake * (odds - 1.0)
            } else {
                result.losses += 1;
                -stake
            };
            bankroll += pnl;
            result.total_pnl += pnl;
            result.settle(bankroll);

            debug!(
                "BT {} R{}: {} vs {} | p={:.3} odds={:.2} stake={:.2} => {:?} (bank={:.2})",
                m.match_id, m.round_num, m.home_team, m.away_team, p_cal, odds, stake, outcome, bankroll
            );

            result.ledger.push(LedgerEntry {
                match_id: m.match_id.clone(),
                round_num: m.round_num,
                home_team: m.home_team.clone(),
                away_team: m.away_team.clone(),
                p_cal,
                odds,
                close_price: row.close_price,
                clv: row.clv(),
                stake,
                outcome,
                pnl,
                bankroll,
            });
        }

        result.final_bankroll = bankroll;

        let summary = result.summary();
        info!(
            "Backtest S{}: bets {} (W:{} L:{}) | hit rate {:.1}% | P&L {:.2} | ROI {:.2}%",
            season, summary.total_bets, summary.wins, summary.losses, summary.hit_rate_pct, summary.total_pnl, summary.roi_pct
        );
        info!(
            "Bankroll {:.2} -> {:.2} | peak {:.2} | max DD {:.1}% | avg Brier {:.5}",
            summary.initial_bankroll,
            summary.final_bankroll,
            summary.peak_bankroll,
            summary.max_drawdown_pct,
            summary.avg_brier_score
        );
        info!(
            "Skipped {} (entropy {}, edge floor {}, exposure cap {})",
            summary.no_edge_skipped, summary.entropy_skipped, summary.edge_floor_skipped, summary.exposure_capped
        );

        Ok(result)
    }
}
