//! NRL Edge CLI - backtests, calibration fits and purged CV from CSV data

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use nrl_edge::backtesting::{analyze_by_round, calculate_sharpe_ratio, BacktestEngine, BacktestResult, BacktestSources};
use nrl_edge::config::{load_config, EngineConfig};
use nrl_edge::core::{CalibrationFit, Calibrator};
use nrl_edge::data::{
    CalibrationStore, InMemoryCalibrationStore, JsonCalibrationStore, MatchTable, MlProbabilityProvider,
    PredictionSource, PredictionTable,
};
use nrl_edge::predictor::{LogisticModel, LogisticRegressionFactory, ModelProvider};
use nrl_edge::validation::{evaluate_candidate, CandidateReport, TrainingSet};

#[derive(Parser)]
#[command(name = "nrl-edge")]
#[command(author, version, about = "Calibrated staking, guardrails and leakage-safe backtests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (EDGE_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a season through the betting policy
    Backtest {
        /// Resolved matches with feature columns
        #[arg(long)]
        matches: PathBuf,

        #[arg(long)]
        season: i32,

        /// Restrict to rounds (comma separated)
        #[arg(long, value_delimiter = ',')]
        rounds: Option<Vec<u32>>,

        /// JSON calibration store (no calibration when omitted)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Starting bankroll (overrides configuration)
        #[arg(long)]
        bankroll: Option<f64>,

        /// Train the ML model on these seasons and blend it in
        #[arg(long, value_delimiter = ',')]
        train_seasons: Option<Vec<i32>>,

        /// Print every placed bet
        #[arg(long)]
        ledger: bool,
    },

    /// Fit and persist a season's calibration
    Calibrate {
        /// Stored predictions (season, p_fair, outcome)
        #[arg(long)]
        predictions: PathBuf,

        #[arg(long)]
        season: i32,

        #[arg(long)]
        store: PathBuf,
    },

    /// Purged walk-forward CV of the logistic model
    Cv {
        #[arg(long)]
        matches: PathBuf,

        /// Seasons to train on (all seasons in the file when omitted)
        #[arg(long, value_delimiter = ',')]
        seasons: Option<Vec<i32>>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    println!("{}", "NRL Edge".cyan().bold());

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Backtest {
            matches,
            season,
            rounds,
            store,
            bankroll,
            train_seasons,
            ledger,
        } => run_backtest(
            config,
            &matches,
            season,
            rounds.as_deref(),
            store.as_deref(),
            bankroll,
            train_seasons.as_deref(),
            ledger,
        ),
        Commands::Calibrate {
            predictions,
            season,
            store,
        } => run_calibrate(&config, &predictions, season, &store),
        Commands::Cv { matches, seasons } => run_cv(&config, &matches, seasons.as_deref()),
    }
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid spinner template")?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

fn train_candidate(
    config: &EngineConfig,
    table: &MatchTable,
    seasons: &[i32],
) -> Result<CandidateReport<LogisticModel>> {
    let set = TrainingSet::from_history(table, table, seasons).context("Failed to build training set")?;
    println!("Training rows: {} (seasons {:?})", set.len(), seasons);

    let pb = spinner("Running purged walk-forward CV...")?;
    let report = evaluate_candidate(&LogisticRegressionFactory::default(), &set, &config.validation)
        .context("Candidate evaluation failed")?;
    pb.finish_and_clear();
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn run_backtest(
    mut config: EngineConfig,
    matches_path: &Path,
    season: i32,
    rounds: Option<&[u32]>,
    store_path: Option<&Path>,
    bankroll: Option<f64>,
    train_seasons: Option<&[i32]>,
    show_ledger: bool,
) -> Result<()> {
    println!("{} S{}", "Running backtest".green(), season);

    if let Some(bankroll) = bankroll {
        config.backtest.initial_bankroll = bankroll;
        config.validate().context("Invalid bankroll")?;
    }

    let table = MatchTable::load(matches_path).with_context(|| format!("Failed to load {:?}", matches_path))?;

    let store: Box<dyn CalibrationStore> = match store_path {
        Some(path) => Box::new(JsonCalibrationStore::new(path)),
        None => Box::new(InMemoryCalibrationStore::new()),
    };

    let ml_provider = match train_seasons {
        Some(seasons) => {
            if seasons.contains(&season) {
                bail!("Training seasons must not include the backtest season {}", season);
            }
            let report = train_candidate(&config, &table, seasons)?;
            println!("ML model CV Brier: {:.4}", report.cv.brier_mean);
            Some(ModelProvider::new(report.model))
        }
        None => None,
    };

    println!("Initial bankroll: {:.2}", config.backtest.initial_bankroll);
    println!(
        "Guardrails: entropy <= {:.2}, edge >= {:.2}, round exposure <= {:.0}%",
        config.guardrails.max_entropy,
        config.guardrails.min_edge,
        config.guardrails.max_round_exposure_frac * 100.0
    );
    println!();

    let sources = BacktestSources {
        matches: &table,
        features: &table,
        ml: ml_provider.as_ref().map(|p| p as &dyn MlProbabilityProvider),
        calibration: store.as_ref(),
    };

    let pb = spinner("Replaying matches...")?;
    let engine = BacktestEngine::new(config);
    let result = engine.run(season, rounds, &sources).context("Backtest failed")?;
    pb.finish_and_clear();

    print_summary(&result);

    if !result.ledger.is_empty() {
        println!("\n{}", "Analysis by Round:".yellow().bold());
        println!(
            "{:>6} {:>6} {:>6} {:>10} {:>10} {:>10} {:>8}",
            "Round", "Bets", "Wins", "Hit Rate", "Staked", "P&L", "ROI"
        );
        println!("{}", "-".repeat(62));
        for a in analyze_by_round(&result.ledger) {
            println!(
                "{:>6} {:>6} {:>6} {:>9.1}% {:>10.2} {:>10.2} {:>7.1}%",
                a.round_num,
                a.bets,
                a.wins,
                a.hit_rate * 100.0,
                a.stake,
                a.pnl,
                a.roi * 100.0
            );
        }
        println!(
            "\nSharpe ratio (per bet): {:.3}",
            calculate_sharpe_ratio(&result.ledger, 0.0)
        );
    }

    if show_ledger {
        println!("\n{}", "Ledger:".yellow().bold());
        for e in &result.ledger {
            let outcome = if e.outcome.is_win() {
                "WIN".green()
            } else {
                "LOSS".red()
            };
            println!(
                "R{:<3} {:<24} p={:.3} odds={:.2} stake={:>8.2} {:<4} pnl={:>8.2} bank={:.2}",
                e.round_num,
                format!("{} v {}", e.home_team, e.away_team),
                e.p_cal,
                e.odds,
                e.stake,
                outcome,
                e.pnl,
                e.bankroll
            );
        }
    }

    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let s = result.summary();

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Bets: {} (W:{} L:{}) | Hit rate: {:.1}%", s.total_bets, s.wins, s.losses, s.hit_rate_pct);
    let pnl = format!("{:.2}", s.total_pnl);
    println!(
        "P&L: {} | ROI: {:.2}%",
        if s.total_pnl >= 0.0 { pnl.green() } else { pnl.red() },
        s.roi_pct
    );
    println!(
        "Bankroll: {:.2} -> {:.2} | Peak: {:.2} | Max DD: {:.1}%",
        s.initial_bankroll, s.final_bankroll, s.peak_bankroll, s.max_drawdown_pct
    );
    println!("{}", "-".repeat(60));
    println!("Avg Brier: {:.5} | Avg CLV: {:.4}", s.avg_brier_score, s.avg_clv);
    println!("Skipped (no edge): {}", s.no_edge_skipped);
    println!(
        "Guardrails - entropy: {}, edge floor: {}, exposure cap: {}",
        s.entropy_skipped, s.edge_floor_skipped, s.exposure_capped
    );
    println!("{}", "=".repeat(60));
}

fn run_calibrate(config: &EngineConfig, predictions_path: &Path, season: i32, store_path: &Path) -> Result<()> {
    println!("{} S{}", "Fitting calibration".green(), season);

    let table = PredictionTable::load(predictions_path)
        .with_context(|| format!("Failed to load {:?}", predictions_path))?;
    let samples = table.labeled_predictions(season)?;

    let store = JsonCalibrationStore::new(store_path);
    let calibrator = Calibrator::new(config.calibration, &store);

    match calibrator.fit(season, &samples).context("Calibration fit failed")? {
        CalibrationFit::Fitted(params) => {
            println!(
                "{} a={:.4} b={:.4} brier={:.5} on {} samples",
                "Fitted".green(),
                params.a,
                params.b,
                params.brier_loss,
                params.n_samples
            );
            println!("Saved to {:?}", store_path);
        }
        CalibrationFit::Insufficient { samples, required } => {
            println!(
                "{} {} samples, {} required; nothing persisted",
                "Insufficient data:".yellow(),
                samples,
                required
            );
        }
    }

    Ok(())
}

fn run_cv(config: &EngineConfig, matches_path: &Path, seasons: Option<&[i32]>) -> Result<()> {
    println!("{}", "Purged walk-forward CV".green());

    let table = MatchTable::load(matches_path).with_context(|| format!("Failed to load {:?}", matches_path))?;
    let seasons = match seasons {
        Some(s) => s.to_vec(),
        None => table.seasons(),
    };

    let report = train_candidate(config, &table, &seasons)?;
    let cv = &report.cv;

    if cv.is_fallback() {
        println!("{}", "No viable folds; showing fallback metrics".yellow());
    } else {
        println!(
            "{:>5} {:>10} {:>14} {:>10} {:>10}",
            "Fold", "Train", "Test", "Brier", "LogLoss"
        );
        println!("{}", "-".repeat(54));
        for f in &cv.folds {
            println!(
                "{:>5} {:>10} {:>14} {:>10.4} {:>10.4}",
                f.window.fold,
                format!("0..{}", f.window.train_end),
                format!("{}..{}", f.window.test_start, f.window.test_end),
                f.brier,
                f.log_loss
            );
        }
    }

    println!("{}", "-".repeat(54));
    println!("Brier:    {:.4} ± {:.4}", cv.brier_mean, cv.brier_std);
    println!("Log loss: {:.4} ± {:.4}", cv.logloss_mean, cv.logloss_std);

    Ok(())
}
