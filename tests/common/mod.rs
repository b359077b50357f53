//! Common test fixtures

#![allow(dead_code)]

use chrono::NaiveDate;
use nrl_edge::data::InMemoryMatchData;
use nrl_edge::models::{FeatureRow, LabeledPrediction, MatchRecord};

pub const SEASON: i32 = 2025;

pub fn match_record(id: &str, season: i32, round: u32, day: u32, home_win: bool) -> MatchRecord {
    MatchRecord {
        match_id: id.to_string(),
        season,
        round_num: round,
        match_date: NaiveDate::from_ymd_opt(season, 3, 1).unwrap() + chrono::Duration::days(day as i64),
        home_team: "Storm".to_string(),
        away_team: "Sharks".to_string(),
        home_score: if home_win { 26 } else { 12 },
        away_score: if home_win { 10 } else { 22 },
    }
}

/// Clear favourite priced at `odds`
pub fn favourite(odds: f64, close_price: f64) -> FeatureRow {
    FeatureRow {
        rating_diff: 300.0,
        home_form: 0.7,
        away_form: 0.4,
        odds_taken: odds,
        close_price,
        ..Default::default()
    }
}

/// A season of four-match rounds: the second favourite of each round loses
pub fn sample_season(rounds: u32) -> InMemoryMatchData {
    let mut data = InMemoryMatchData::new();
    for round in 1..=rounds {
        for slot in 0..4 {
            let id = format!("{}-r{:02}-{}", SEASON, round, slot);
            let home_win = slot != 1;
            let record = match_record(&id, SEASON, round, (round - 1) * 7 + slot, home_win);
            data.insert(record, favourite(2.1, 1.95));
        }
    }
    data
}

/// Alternating confident predictions that are always right
pub fn separating_predictions(n: usize) -> Vec<LabeledPrediction> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                LabeledPrediction::new(0.7, true)
            } else {
                LabeledPrediction::new(0.3, false)
            }
        })
        .collect()
}
