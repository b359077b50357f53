//! Betting guardrails: entropy gate, edge floor, round exposure cap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Guardrail thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Maximum binary entropy (nats) a prediction may carry. ln(2) ~ 0.693 is a coin flip.
    pub max_entropy: f64,
    /// Minimum expected value per unit staked
    pub min_edge: f64,
    /// Maximum fraction of bankroll committed within one round
    pub max_round_exposure_frac: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_entropy: 0.65,
            min_edge: 0.05,
            max_round_exposure_frac: 0.06,
        }
    }
}

/// Binary entropy in nats. Maximal (ln 2) at p = 0.5, zero at p ∈ {0, 1}.
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.ln() + (1.0 - p) * (1.0 - p).ln())
}

/// True if the prediction is confident enough (entropy at or below the threshold)
pub fn passes_entropy_gate(p: f64, max_entropy: f64) -> bool {
    binary_entropy(p) <= max_entropy
}

/// True if expected value reaches the minimum edge
pub fn passes_edge_floor(ev: f64, min_edge: f64) -> bool {
    ev >= min_edge
}

/// Expected profit per unit staked at decimal odds
pub fn expected_value(p: f64, odds: f64) -> f64 {
    p * odds - 1.0
}

/// Outcome of the per-bet guardrail checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailVerdict {
    Pass,
    EntropyGate,
    EdgeFloor,
}

/// Stateless per-bet checks; exposure is tracked separately per run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GuardrailPolicy {
    config: GuardrailConfig,
}

impl GuardrailPolicy {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    pub fn entropy_gate(&self, p: f64) -> bool {
        passes_entropy_gate(p, self.config.max_entropy)
    }

    pub fn edge_floor(&self, ev: f64) -> bool {
        passes_edge_floor(ev, self.config.min_edge)
    }

    /// Entropy gate first, then edge floor
    pub fn check(&self, p: f64, ev: f64) -> GuardrailVerdict {
        if !self.entropy_gate(p) {
            GuardrailVerdict::EntropyGate
        } else if !self.edge_floor(ev) {
            GuardrailVerdict::EdgeFloor
        } else {
            GuardrailVerdict::Pass
        }
    }

    /// Fresh exposure tracker for one run
    pub fn exposure_tracker(&self, bankroll: f64) -> RoundExposureTracker {
        RoundExposureTracker::new(bankroll, self.config.max_round_exposure_frac)
    }
}

/// Cumulative stake committed per round, owned by a single run
#[derive(Debug, Clone)]
pub struct RoundExposureTracker {
    bankroll: f64,
    max_frac: f64,
    round_stakes: BTreeMap<u32, f64>,
}

impl RoundExposureTracker {
    pub fn new(bankroll: f64, max_frac: f64) -> Self {
        Self {
            bankroll,
            max_frac,
            round_stakes: BTreeMap::new(),
        }
    }

    /// Stake budget per round
    pub fn cap(&self) -> f64 {
        self.bankroll * self.max_frac
    }

    /// Stake already committed in a round
    pub fn used(&self, round_num: u32) -> f64 {
        self.round_stakes.get(&round_num).copied().unwrap_or(0.0)
    }

    /// Remaining stake budget for a round
    pub fn remaining(&self, round_num: u32) -> f64 {
        (self.cap() - self.used(round_num)).max(0.0)
    }

    pub fn can_stake(&self, round_num: u32, stake: f64) -> bool {
        stake <= self.remaining(round_num)
    }

    /// The smaller of the proposed stake and the remaining round budget
    pub fn clamp_stake(&self, round_num: u32, stake: f64) -> f64 {
        stake.min(self.remaining(round_num))
    }

    pub fn record(&mut self, round_num: u32, stake: f64) {
        *self.round_stakes.entry(round_num).or_insert(0.0) += stake;
    }

    /// Rounds with recorded exposure
    pub fn rounds(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.round_stakes.iter().map(|(&r, &s)| (r, s))
    }
}
