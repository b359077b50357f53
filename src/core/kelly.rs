//! Kelly Criterion Stake Sizing
//!
//! Fractional-Kelly sizing for decimal odds with a Kelly-fraction cap and a
//! per-bet heat cap.
//!
//! The Kelly criterion formula:
//!     f* = (b*p - q) / b
//!
//! Where:
//!     f* = fraction of bankroll to stake
//!     b = odds - 1 (net odds)
//!     p = probability of winning
//!     q = 1 - p (probability of losing)
//!     odds = decimal odds (e.g., 2.0 returns 2x the stake on a win)

use serde::{Deserialize, Serialize};

/// Why a sizing decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingReason {
    /// No positive Kelly fraction (no edge, or non-positive payout odds)
    NoEdge,
    /// Stake sized by (fractional) Kelly
    Kelly,
}

impl SizingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizingReason::NoEdge => "no edge",
            SizingReason::Kelly => "kelly",
        }
    }
}

/// Stake recommendation for a single bet
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizingDecision {
    pub stake: f64,
    /// Bankroll fraction actually used, after fractionalization and caps
    pub kelly_fraction: f64,
    /// True when a cap bound the fraction
    pub capped: bool,
    pub reason: SizingReason,
}

impl SizingDecision {
    fn no_edge() -> Self {
        Self {
            stake: 0.0,
            kelly_fraction: 0.0,
            capped: false,
            reason: SizingReason::NoEdge,
        }
    }
}

/// Sizing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Multiplier applied to full Kelly (1.0 = full Kelly)
    pub fractional_kelly: f64,
    /// Cap on the fractionalized Kelly fraction
    pub kelly_fraction_cap: f64,
    /// Heat cap: maximum bankroll fraction for a single bet
    pub max_stake_frac: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            fractional_kelly: 1.0,
            kelly_fraction_cap: 1.0,
            max_stake_frac: 0.05,
        }
    }
}

/// Full Kelly fraction for a single bet, floored at zero
///
/// # Examples
/// ```
/// use nrl_edge::core::kelly::kelly_fraction;
/// assert_eq!(kelly_fraction(0.5, 2.0), 0.0);
/// assert!((kelly_fraction(0.6, 2.0) - 0.2).abs() < 1e-12);
/// ```
pub fn kelly_fraction(probability: f64, odds: f64) -> f64 {
    let b = odds - 1.0;
    if b <= 0.0 {
        return 0.0;
    }

    let q = 1.0 - probability;
    let f = (b * probability - q) / b;
    f.max(0.0)
}

/// Scale a Kelly fraction by the fractional multiplier.
///
/// A non-positive multiplier is treated as 1.0 (full Kelly).
pub fn apply_fractional_kelly(f: f64, multiplier: f64) -> f64 {
    let multiplier = if multiplier <= 0.0 { 1.0 } else { multiplier };
    f * multiplier
}

/// Fractional-Kelly stake sizer with fraction and heat caps
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StakeSizer {
    config: SizingConfig,
}

impl StakeSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SizingConfig {
        &self.config
    }

    /// Kelly fraction after fractionalization and the Kelly-fraction cap,
    /// before the heat cap
    pub fn fraction(&self, probability: f64, odds: f64) -> f64 {
        let raw = kelly_fraction(probability, odds);
        let f = apply_fractional_kelly(raw, self.config.fractional_kelly);
        f.min(self.config.kelly_fraction_cap)
    }

    /// Size a stake against the configured heat cap
    pub fn size(&self, bankroll: f64, probability: f64, odds: f64) -> SizingDecision {
        self.size_with_cap(bankroll, probability, odds, self.config.max_stake_frac)
    }

    /// Size a stake with an explicit heat cap
    pub fn size_with_cap(
        &self,
        bankroll: f64,
        probability: f64,
        odds: f64,
        max_frac: f64,
    ) -> SizingDecision {
        let uncapped = apply_fractional_kelly(
            kelly_fraction(probability, odds),
            self.config.fractional_kelly,
        );

        if uncapped <= 0.0 {
            return SizingDecision::no_edge();
        }

        let cap = self.config.kelly_fraction_cap.min(max_frac);
        let (f, capped) = if uncapped > cap {
            (cap, true)
        } else {
            (uncapped, false)
        };

        SizingDecision {
            stake: (bankroll * f).max(0.0),
            kelly_fraction: f,
            capped,
            reason: SizingReason::Kelly,
        }
    }
}

/// Size a stake with full Kelly and the given heat cap
pub fn size_stake(bankroll: f64, probability: f64, odds: f64, max_frac: f64) -> SizingDecision {
    StakeSizer::default().size_with_cap(bankroll, probability, odds, max_frac)
}
