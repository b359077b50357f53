//! CSV loading for resolved matches and stored predictions

use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

use super::memory::{InMemoryMatchData, InMemoryPredictions};
use super::providers::{FeatureProvider, HistoricalMatchProvider, PredictionSource};
use crate::error::{EngineError, Result};
use crate::models::{FeatureRow, LabeledPrediction, MatchRecord};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y"];

fn read_csv(path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Column values as strings (numeric ids are rendered)
fn string_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.trim().to_string()))
        .collect())
}

fn i64_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let series = df.column(name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

/// Optional float column; absent columns yield all-null
fn f64_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    match df.column(name) {
        Ok(series) => {
            let series = series.cast(&DataType::Float64)?;
            Ok(series.f64()?.into_iter().collect())
        }
        Err(_) => Ok(vec![None; df.height()]),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Point-in-time feature columns with their fallback values
struct FeatureColumns {
    home_rest_days: Vec<Option<f64>>,
    away_rest_days: Vec<Option<f64>>,
    home_form: Vec<Option<f64>>,
    away_form: Vec<Option<f64>>,
    home_coach_style: Vec<Option<f64>>,
    away_coach_style: Vec<Option<f64>>,
    home_injuries: Vec<Option<f64>>,
    away_injuries: Vec<Option<f64>>,
    rating_diff: Vec<Option<f64>>,
    is_wet: Vec<Option<f64>>,
    temp_c: Vec<Option<f64>>,
    wind_speed_kmh: Vec<Option<f64>>,
    odds_taken: Vec<Option<f64>>,
    close_price: Vec<Option<f64>>,
}

impl FeatureColumns {
    fn read(df: &DataFrame) -> PolarsResult<Self> {
        Ok(Self {
            home_rest_days: f64_column(df, "home_rest_days")?,
            away_rest_days: f64_column(df, "away_rest_days")?,
            home_form: f64_column(df, "home_form")?,
            away_form: f64_column(df, "away_form")?,
            home_coach_style: f64_column(df, "home_coach_style")?,
            away_coach_style: f64_column(df, "away_coach_style")?,
            home_injuries: f64_column(df, "home_injuries")?,
            away_injuries: f64_column(df, "away_injuries")?,
            rating_diff: f64_column(df, "rating_diff")?,
            is_wet: f64_column(df, "is_wet")?,
            temp_c: f64_column(df, "temp_c")?,
            wind_speed_kmh: f64_column(df, "wind_speed_kmh")?,
            odds_taken: f64_column(df, "odds_taken")?,
            close_price: f64_column(df, "close_price")?,
        })
    }

    fn row(&self, i: usize) -> FeatureRow {
        let d = FeatureRow::default();
        let odds_taken = self.odds_taken[i].unwrap_or(d.odds_taken);
        let close_price = self.close_price[i].unwrap_or(odds_taken);
        let market_implied_prob = if close_price > 0.0 {
            1.0 / close_price
        } else {
            0.5
        };

        FeatureRow {
            home_rest_days: self.home_rest_days[i].unwrap_or(d.home_rest_days),
            away_rest_days: self.away_rest_days[i].unwrap_or(d.away_rest_days),
            home_form: self.home_form[i].unwrap_or(d.home_form),
            away_form: self.away_form[i].unwrap_or(d.away_form),
            home_coach_style: self.home_coach_style[i].unwrap_or(d.home_coach_style),
            away_coach_style: self.away_coach_style[i].unwrap_or(d.away_coach_style),
            home_injuries: self.home_injuries[i].unwrap_or(d.home_injuries),
            away_injuries: self.away_injuries[i].unwrap_or(d.away_injuries),
            market_implied_prob,
            rating_diff: self.rating_diff[i].unwrap_or(d.rating_diff),
            is_wet: self.is_wet[i].unwrap_or(d.is_wet),
            temp_c: self.temp_c[i].unwrap_or(d.temp_c),
            wind_speed_kmh: self.wind_speed_kmh[i].unwrap_or(d.wind_speed_kmh),
            odds_taken,
            close_price,
        }
    }
}

/// Resolved matches with their feature rows, loaded from one CSV
///
/// Required columns: match_id, season, round_num, match_date, home_team,
/// away_team, home_score, away_score. Feature columns are optional and
/// default when absent or null. Matches without both scores are skipped.
pub struct MatchTable {
    data: InMemoryMatchData,
}

impl MatchTable {
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self> {
        let path = csv_path.as_ref();
        let df = read_csv(path)?;

        let match_ids = string_column(&df, "match_id")?;
        let seasons = i64_column(&df, "season")?;
        let rounds = i64_column(&df, "round_num")?;
        let dates = string_column(&df, "match_date")?;
        let home_teams = string_column(&df, "home_team")?;
        let away_teams = string_column(&df, "away_team")?;
        let home_scores = i64_column(&df, "home_score")?;
        let away_scores = i64_column(&df, "away_score")?;
        let features = FeatureColumns::read(&df)?;

        let mut data = InMemoryMatchData::new();
        let mut unresolved = 0usize;

        for i in 0..df.height() {
            let (Some(match_id), Some(season), Some(round_num), Some(raw_date)) = (
                match_ids[i].clone(),
                seasons[i],
                rounds[i],
                dates[i].as_deref(),
            ) else {
                return Err(EngineError::Data(format!(
                    "{:?} row {}: missing match_id, season, round_num or match_date",
                    path, i
                )));
            };

            let (Some(home_score), Some(away_score)) = (home_scores[i], away_scores[i]) else {
                unresolved += 1;
                continue;
            };

            let match_date = parse_date(raw_date).ok_or_else(|| {
                EngineError::Data(format!("{:?} row {}: bad match_date {:?}", path, i, raw_date))
            })?;

            let season = i32::try_from(season)
                .map_err(|_| EngineError::Data(format!("{:?} row {}: season {} out of range", path, i, season)))?;
            let round_num = u32::try_from(round_num)
                .map_err(|_| EngineError::Data(format!("{:?} row {}: round_num {} out of range", path, i, round_num)))?;

            let record = MatchRecord {
                match_id,
                season,
                round_num,
                match_date,
                home_team: home_teams[i].clone().unwrap_or_else(|| "HOME".to_string()),
                away_team: away_teams[i].clone().unwrap_or_else(|| "AWAY".to_string()),
                home_score: home_score.max(0) as u32,
                away_score: away_score.max(0) as u32,
            };
            data.insert(record, features.row(i));
        }

        if unresolved > 0 {
            warn!("Skipped {} unresolved matches in {:?}", unresolved, path);
        }
        info!("Loaded {} resolved matches from {:?}", data.len(), path);

        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn seasons(&self) -> Vec<i32> {
        self.data.seasons()
    }
}

impl HistoricalMatchProvider for MatchTable {
    fn matches_for(&self, season: i32, rounds: Option<&[u32]>) -> Result<Vec<MatchRecord>> {
        self.data.matches_for(season, rounds)
    }
}

impl FeatureProvider for MatchTable {
    fn get_features(&self, match_id: &str) -> Result<FeatureRow> {
        self.data.get_features(match_id)
    }
}

/// Stored fair probabilities with outcomes (columns: season, p_fair, outcome)
pub struct PredictionTable {
    predictions: InMemoryPredictions,
}

impl PredictionTable {
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self> {
        let path = csv_path.as_ref();
        let df = read_csv(path)?;

        let seasons = i64_column(&df, "season")?;
        let p_fair = f64_column(&df, "p_fair")?;
        let outcome = f64_column(&df, "outcome")?;

        let mut predictions = InMemoryPredictions::new();
        let mut loaded = 0usize;
        let mut non_finite = 0usize;
        for i in 0..df.height() {
            if let (Some(season), Some(p), Some(y)) = (seasons[i], p_fair[i], outcome[i]) {
                if !p.is_finite() {
                    non_finite += 1;
                    continue;
                }
                let season = i32::try_from(season)
                    .map_err(|_| EngineError::Data(format!("{:?} row {}: season {} out of range", path, i, season)))?;
                predictions.push(season, LabeledPrediction::new(p, y >= 0.5));
                loaded += 1;
            }
        }

        if non_finite > 0 {
            warn!("Skipped {} non-finite p_fair rows in {:?}", non_finite, path);
        }

        info!("Loaded {} labeled predictions from {:?}", loaded, path);
        Ok(Self { predictions })
    }
}

impl PredictionSource for PredictionTable {
    fn labeled_predictions(&self, season: i32) -> Result<Vec<LabeledPrediction>> {
        self.predictions.labeled_predictions(season)
    }
}
