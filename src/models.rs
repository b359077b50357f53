use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Names of the model features, in the order produced by [`FeatureRow::to_vector`]
pub const FEATURE_NAMES: [&str; 13] = [
    "home_rest_days",
    "away_rest_days",
    "home_form",
    "away_form",
    "home_coach_style",
    "away_coach_style",
    "home_injuries",
    "away_injuries",
    "market_implied_prob",
    "rating_diff",
    "is_wet",
    "temp_c",
    "wind_speed_kmh",
];

/// Default decimal odds used when no price was recorded
pub const DEFAULT_ODDS: f64 = 1.90;

/// Point-in-time feature snapshot for a single match (home team perspective)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub home_rest_days: f64,
    pub away_rest_days: f64,
    pub home_form: f64,
    pub away_form: f64,
    pub home_coach_style: f64,
    pub away_coach_style: f64,
    pub home_injuries: f64,
    pub away_injuries: f64,
    pub market_implied_prob: f64,
    pub rating_diff: f64,
    pub is_wet: f64,
    pub temp_c: f64,
    pub wind_speed_kmh: f64,
    /// Decimal odds the home H2H bet would be taken at
    pub odds_taken: f64,
    /// Closing decimal odds for the home H2H market
    pub close_price: f64,
}

impl Default for FeatureRow {
    fn default() -> Self {
        Self {
            home_rest_days: 7.0,
            away_rest_days: 7.0,
            home_form: 0.5,
            away_form: 0.5,
            home_coach_style: 0.0,
            away_coach_style: 0.0,
            home_injuries: 0.0,
            away_injuries: 0.0,
            market_implied_prob: 0.5,
            rating_diff: 0.0,
            is_wet: 0.0,
            temp_c: 20.0,
            wind_speed_kmh: 10.0,
            odds_taken: DEFAULT_ODDS,
            close_price: DEFAULT_ODDS,
        }
    }
}

impl FeatureRow {
    /// Model input vector, ordered as [`FEATURE_NAMES`]
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.home_rest_days,
            self.away_rest_days,
            self.home_form,
            self.away_form,
            self.home_coach_style,
            self.away_coach_style,
            self.home_injuries,
            self.away_injuries,
            self.market_implied_prob,
            self.rating_diff,
            self.is_wet,
            self.temp_c,
            self.wind_speed_kmh,
        ]
    }

    /// Closing line value in odds space (positive when the taken price beat the close)
    pub fn clv(&self) -> f64 {
        self.close_price - self.odds_taken
    }
}

/// A resolved match with known final scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub season: i32,
    pub round_num: u32,
    pub match_date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
}

impl MatchRecord {
    pub fn home_win(&self) -> bool {
        self.home_score > self.away_score
    }

    /// Chronological ordering key used by backtests and training sets
    pub fn sort_key(&self) -> (u32, NaiveDate, &str) {
        (self.round_num, self.match_date, self.match_id.as_str())
    }
}

/// Sort matches into (round_num, match_date, match_id) order
pub fn sort_chronologically(matches: &mut [MatchRecord]) {
    matches.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// A stored fair probability together with the realised outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledPrediction {
    pub p_fair: f64,
    pub home_win: bool,
}

impl LabeledPrediction {
    pub fn new(p_fair: f64, home_win: bool) -> Self {
        Self { p_fair, home_win }
    }
}

/// Probabilities produced for one match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub p_heuristic: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_ml: Option<f64>,
    pub p_blend: f64,
    pub p_calibrated: f64,
}

/// Settlement of a placed bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetOutcome {
    Win,
    Loss,
}

impl BetOutcome {
    pub fn from_home_win(home_win: bool) -> Self {
        if home_win {
            BetOutcome::Win
        } else {
            BetOutcome::Loss
        }
    }

    pub fn is_win(self) -> bool {
        matches!(self, BetOutcome::Win)
    }
}
