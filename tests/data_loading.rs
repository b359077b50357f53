//! CSV loaders and the JSON calibration store on real files

mod common;

use common::separating_predictions;
use nrl_edge::core::{CalibrationConfig, CalibrationFit, Calibrator};
use nrl_edge::data::{
    CalibrationStore, FeatureProvider, HistoricalMatchProvider, JsonCalibrationStore, MatchTable,
    PredictionSource, PredictionTable,
};
use nrl_edge::error::EngineError;
use nrl_edge::models::FeatureRow;
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_csv(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const MATCHES_CSV: &str = "\
match_id,season,round_num,match_date,home_team,away_team,home_score,away_score,rating_diff,home_form,away_form,odds_taken,close_price
m3,2025,2,2025-03-14,Eels,Tigers,18,20,-40.0,0.4,0.6,2.40,2.30
m1,2025,1,2025-03-07,Storm,Sharks,30,12,120.0,0.8,0.5,1.65,1.60
m2,2025,1,2025-03-08,Broncos,Cowboys,,,,,,,
m4,2024,5,2024-04-01,Knights,Titans,22,16,,,,,
";

#[test]
fn test_match_table_loads_resolved_matches() {
    let file = write_csv(MATCHES_CSV);
    let table = MatchTable::load(file.path()).unwrap();

    // m2 has no scores
    assert_eq!(table.len(), 3);
    assert_eq!(table.seasons(), vec![2024, 2025]);

    let season: Vec<String> = table
        .matches_for(2025, None)
        .unwrap()
        .into_iter()
        .map(|m| m.match_id)
        .collect();
    assert_eq!(season, vec!["m1".to_string(), "m3".to_string()]);

    let round_two = table.matches_for(2025, Some(&[2][..])).unwrap();
    assert_eq!(round_two.len(), 1);
    assert!(!round_two[0].home_win());
}

#[test]
fn test_match_table_feature_rows() {
    let file = write_csv(MATCHES_CSV);
    let table = MatchTable::load(file.path()).unwrap();

    let row = table.get_features("m1").unwrap();
    assert_eq!(row.rating_diff, 120.0);
    assert_eq!(row.home_form, 0.8);
    assert_eq!(row.odds_taken, 1.65);
    assert_eq!(row.close_price, 1.60);
    assert!((row.market_implied_prob - 1.0 / 1.60).abs() < 1e-12);
    assert_eq!(row.home_rest_days, 7.0);

    // Null feature columns fall back to defaults
    let row = table.get_features("m4").unwrap();
    let defaults = FeatureRow::default();
    assert_eq!(row.rating_diff, defaults.rating_diff);
    assert_eq!(row.odds_taken, defaults.odds_taken);
    assert_eq!(row.close_price, defaults.odds_taken);

    assert!(matches!(
        table.get_features("m2"),
        Err(EngineError::MatchNotFound(_))
    ));
}

#[test]
fn test_match_table_rejects_bad_dates() {
    let file = write_csv(
        "match_id,season,round_num,match_date,home_team,away_team,home_score,away_score\n\
         m1,2025,1,not-a-date,Storm,Sharks,30,12\n",
    );
    assert!(matches!(MatchTable::load(file.path()), Err(EngineError::Data(_))));
}

#[test]
fn test_match_table_missing_required_column() {
    let file = write_csv("match_id,season,home_score,away_score\nm1,2025,30,12\n");
    assert!(MatchTable::load(file.path()).is_err());
}

#[test]
fn test_prediction_table() {
    let file = write_csv("season,p_fair,outcome\n2025,0.7,1\n2025,0.3,0\n2024,0.6,1\n2025,,1\n");
    let table = PredictionTable::load(file.path()).unwrap();

    let samples = table.labeled_predictions(2025).unwrap();
    assert_eq!(samples.len(), 2);
    assert!(samples[0].home_win);
    assert!(!samples[1].home_win);
    assert_eq!(table.labeled_predictions(2023).unwrap().len(), 0);
}

#[test]
fn test_calibration_fit_persist_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");

    let store = JsonCalibrationStore::new(&path);
    assert!(store.load_latest(2025).unwrap().is_none());

    let calibrator = Calibrator::new(CalibrationConfig::default(), &store);
    let params = match calibrator.fit(2025, &separating_predictions(120)).unwrap() {
        CalibrationFit::Fitted(params) => params,
        other => panic!("expected a fit, got {:?}", other),
    };
    assert!(params.a > 1.0 && params.b > 1.0);
    assert!(params.brier_loss < 0.05);

    // A fresh handle on the same file sees the fit
    let reopened = JsonCalibrationStore::new(&path);
    assert_eq!(reopened.load_latest(2025).unwrap(), Some(params.clone()));
    assert!(reopened.load_latest(2024).unwrap().is_none());

    let calibrated = Calibrator::new(CalibrationConfig::default(), &reopened)
        .calibrate(2025, 0.7)
        .unwrap();
    assert!(calibrated > 0.7);
}

#[test]
fn test_calibration_insufficient_leaves_store_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let store = JsonCalibrationStore::new(&path);

    let fit = Calibrator::new(CalibrationConfig::default(), &store)
        .fit(2025, &separating_predictions(40))
        .unwrap();

    assert_eq!(
        fit,
        CalibrationFit::Insufficient {
            samples: 40,
            required: 80
        }
    );
    assert!(!path.exists());
}

#[test]
fn test_match_table_rejects_negative_round() {
    let file = write_csv(
        "match_id,season,round_num,match_date,home_team,away_team,home_score,away_score\n\
         m1,2025,-1,2025-03-07,Storm,Sharks,30,12\n",
    );
    assert!(matches!(MatchTable::load(file.path()), Err(EngineError::Data(_))));
}

#[test]
fn test_non_finite_predictions_do_not_poison_store() {
    let mut csv = String::from("season,p_fair,outcome\n");
    for i in 0..100 {
        if i % 2 == 0 {
            csv.push_str("2025,0.7,1\n");
        } else {
            csv.push_str("2025,0.3,0\n");
        }
    }
    csv.push_str("2025,NaN,1\n");
    let file = write_csv(&csv);

    let table = PredictionTable::load(file.path()).unwrap();
    let samples = table.labeled_predictions(2025).unwrap();
    assert_eq!(samples.len(), 100);
    assert!(samples.iter().all(|s| s.p_fair.is_finite()));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    let store = JsonCalibrationStore::new(&path);
    let fit = Calibrator::new(CalibrationConfig::default(), &store)
        .fit(2025, &samples)
        .unwrap();
    let params = fit.params().unwrap().clone();
    assert!(params.brier_loss.is_finite());

    let reopened = JsonCalibrationStore::new(&path);
    assert_eq!(reopened.load_latest(2025).unwrap(), Some(params));
}
