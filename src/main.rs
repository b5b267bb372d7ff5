//! Elo match forecasting CLI
//!
//! Leakage-free Elo features, a time-ordered train/test split, and
//! probabilistic evaluation of the held-out matches.

use clap::{Parser, Subcommand};
use elo_forecast::model::ModelKind;
use elo_forecast::{Config, Result};

#[derive(Parser)]
#[command(name = "elo-forecast")]
#[command(about = "Match outcome forecasting from chronological Elo ratings", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new project with default config
    Init,
    /// Show match log and model status
    Status {
        /// Match log CSV (defaults to data.csv_path)
        #[arg(long)]
        csv: Option<String>,
    },
    /// Write the Elo feature table for a match log
    Features {
        /// Match log CSV (defaults to data.csv_path)
        #[arg(long)]
        csv: Option<String>,
        /// Output CSV (defaults to <artifacts_dir>/features.csv)
        #[arg(long)]
        out: Option<String>,
    },
    /// Train a model on the earlier matches and evaluate on the most recent ones
    Train {
        /// Match log CSV (defaults to data.csv_path)
        #[arg(long)]
        csv: Option<String>,
        /// Fraction of the most recent matches held out for testing
        #[arg(long)]
        test_size: Option<f64>,
        /// Elo K-factor
        #[arg(long)]
        elo_k: Option<f64>,
        /// Starting Elo rating
        #[arg(long)]
        elo_base: Option<f64>,
        /// Model kind (logistic or elo-expected)
        #[arg(long)]
        model: Option<ModelKind>,
        /// Hold out at least this many of the most recent matches
        #[arg(long)]
        trailing_rows: Option<usize>,
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Predict every match in a log, or a single fixture
    Predict {
        /// Team 1 of a single fixture
        team1: Option<String>,
        /// Team 2 of a single fixture
        team2: Option<String>,
        /// Match log CSV; rows without a result are predicted without updating ratings
        #[arg(long)]
        csv: Option<String>,
        /// Write output to a file instead of stdout
        #[arg(long)]
        out: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Show the most recent test-set predictions with correctness
    TestTail {
        /// Number of trailing test rows to show
        #[arg(long, default_value = "20")]
        last_n: usize,
        /// Show the whole test block
        #[arg(long)]
        all_test: bool,
        /// Decision threshold (defaults to evaluation.decision_threshold)
        #[arg(long)]
        threshold: Option<f64>,
        /// Also write the rows to this CSV
        #[arg(long)]
        out: Option<String>,
    },
    /// Export the whole test block with Elo features and probabilities
    ExportTest {
        /// Output CSV (defaults to <artifacts_dir>/test_predictions.csv)
        #[arg(long)]
        out: Option<String>,
    },
    /// Evaluate the saved model on the test block and write report artifacts
    Evaluate {
        /// Output directory (defaults to data.artifacts_dir)
        #[arg(long)]
        out_dir: Option<String>,
        /// Hold out at least this many of the most recent matches
        #[arg(long)]
        trailing_rows: Option<usize>,
    },
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Status { csv } => commands::status(&config, csv),
        Commands::Features { csv, out } => commands::features(&config, csv, out),
        Commands::Train {
            csv,
            test_size,
            elo_k,
            elo_base,
            model,
            trailing_rows,
            epochs,
        } => {
            let overrides = commands::TrainOverrides {
                csv,
                test_size,
                elo_k,
                elo_base,
                model,
                trailing_rows,
                epochs,
            };
            commands::train(&config, overrides)
        }
        Commands::Predict {
            team1,
            team2,
            csv,
            out,
            format,
        } => commands::predict(&config, team1, team2, csv, out, format),
        Commands::TestTail {
            last_n,
            all_test,
            threshold,
            out,
        } => {
            let last_n = if all_test { None } else { Some(last_n) };
            commands::test_tail(&config, last_n, threshold, out)
        }
        Commands::ExportTest { out } => commands::export_test(&config, out),
        Commands::Evaluate {
            out_dir,
            trailing_rows,
        } => commands::evaluate(&config, out_dir, trailing_rows),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::path::{Path, PathBuf};

    use elo_forecast::data::{FeatureTable, LabelPolicy, MatchLog};
    use elo_forecast::model::{save_model, ModelMeta, META_FILE};
    use elo_forecast::predict::report::{
        create_file, write_calibration_csv, write_json, write_predictions_csv,
    };
    use elo_forecast::predict::{format_prediction, format_table, tail, Predictor};
    use elo_forecast::training::{Evaluator, Trainer};
    use elo_forecast::{ForecastError, Prediction};

    pub struct TrainOverrides {
        pub csv: Option<String>,
        pub test_size: Option<f64>,
        pub elo_k: Option<f64>,
        pub elo_base: Option<f64>,
        pub model: Option<ModelKind>,
        pub trailing_rows: Option<usize>,
        pub epochs: Option<usize>,
    }

    fn artifact(config: &Config, name: &str) -> PathBuf {
        Path::new(&config.data.artifacts_dir).join(name)
    }

    fn load_labeled(config: &Config) -> Result<MatchLog> {
        let log = MatchLog::load(&config.data.csv_path, LabelPolicy::Required)?;
        println!("Loaded {} completed matches from {}", log.len(), config.data.csv_path);
        Ok(log)
    }

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        // Create data directory
        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all(&config.data.artifacts_dir)?;
        println!("Created data/ and {}/ directories", config.data.artifacts_dir);

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Put your match log at {}", config.data.csv_path);
        println!("  3. Run 'elo-forecast train' to train the model");
        println!("  4. Run 'elo-forecast predict \"Team A\" \"Team B\"' to make predictions");

        Ok(())
    }

    pub fn status(config: &Config, csv: Option<String>) -> Result<()> {
        let csv_path = csv.unwrap_or_else(|| config.data.csv_path.clone());
        let log = MatchLog::load(&csv_path, LabelPolicy::Optional)?;
        let stats = log.stats();

        println!("Match Log Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", csv_path);
        println!("  Teams:    {}", stats.team_count);
        println!("  Matches:  {}", stats.match_count);
        println!("  Results:  {}", stats.labeled_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_match, stats.latest_match) {
            println!("  Range:    {} to {}", earliest, latest);
        }

        let meta_path = Path::new(&config.data.model_path).join(META_FILE);
        if let Ok(content) = std::fs::read_to_string(&meta_path) {
            let meta: ModelMeta = serde_json::from_str(&content)?;
            println!("\nModel");
            println!("───────────────────────────────");
            println!("  Path:     {}", config.data.model_path);
            println!("  Kind:     {}", meta.kind);
            println!("  Elo:      base={} K={}", meta.elo.base_rating, meta.elo.k_factor);
        } else {
            println!("\nNo trained model at {}", config.data.model_path);
        }

        Ok(())
    }

    pub fn features(config: &Config, csv: Option<String>, out: Option<String>) -> Result<()> {
        let csv_path = csv.unwrap_or_else(|| config.data.csv_path.clone());
        let log = MatchLog::load(&csv_path, LabelPolicy::Optional)?;
        let (ratings, table) = FeatureTable::build(log.records(), config.elo);

        let out = out.map(PathBuf::from).unwrap_or_else(|| artifact(config, "features.csv"));
        table.write_csv(create_file(&out)?)?;
        println!(
            "Wrote {} feature rows for {} teams to {}",
            table.len(),
            ratings.team_count(),
            out.display()
        );

        println!("\nTop ratings:");
        for (team, rating) in ratings.standings().into_iter().take(10) {
            println!("  {:<24} {:>7.1}", team.as_str(), rating);
        }
        Ok(())
    }

    pub fn train(config: &Config, overrides: TrainOverrides) -> Result<()> {
        let mut config = config.clone();
        if let Some(csv) = overrides.csv {
            config.data.csv_path = csv;
        }
        if let Some(f) = overrides.test_size {
            config.split.test_fraction = f;
        }
        if let Some(k) = overrides.elo_k {
            config.elo.k_factor = k;
        }
        if let Some(base) = overrides.elo_base {
            config.elo.base_rating = base;
        }
        if let Some(kind) = overrides.model {
            config.model.kind = kind;
        }
        if let Some(n) = overrides.trailing_rows {
            config.split.trailing_row_override = Some(n);
        }
        if let Some(e) = overrides.epochs {
            config.model.epochs = e;
        }
        config.validate()?;

        println!("Initializing training...");
        let log = load_labeled(&config)?;

        let trainer = Trainer::new(config.clone());
        let mut outcome = trainer.run(log.records())?;
        outcome.info.csv_path = Some(config.data.csv_path.clone());

        // Save model
        println!("\nSaving model to {}...", config.data.model_path);
        save_model(outcome.model.as_ref(), Path::new(&config.data.model_path), &config.elo)?;

        let metrics_path = artifact(&config, "metrics.json");
        let info_path = artifact(&config, "train_info.json");
        write_json(&metrics_path, &outcome.report)?;
        write_json(&info_path, &outcome.info)?;

        println!("\nTraining complete!");
        println!("  Model:      {}", outcome.info.model_type);
        println!(
            "  Split:      {} train / {} test",
            outcome.info.n_train, outcome.info.n_test
        );
        println!("  {}", outcome.report);
        println!("  Metrics:    {}", metrics_path.display());
        println!("  Run info:   {}", info_path.display());

        Ok(())
    }

    pub fn predict(
        config: &Config,
        team1: Option<String>,
        team2: Option<String>,
        csv: Option<String>,
        out: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let fixture = fixture_request(team1, team2)?;
        let predictor = Predictor::load(Path::new(&config.data.model_path), &config.model)?;
        let csv_path = csv.unwrap_or_else(|| config.data.csv_path.clone());
        let log = MatchLog::load(&csv_path, LabelPolicy::Optional)?;
        let (ratings, predictions) = predictor.predict_log(log.records())?;

        // Single fixture from the ratings at the end of the log
        if let Some((team1, team2)) = fixture {
            let prediction = predictor.predict_fixture(&ratings, &team1, &team2)?;
            return emit(config, &[prediction], true, out, format);
        }

        emit(config, &predictions, false, out, format)
    }

    /// Both team names, or neither
    pub(crate) fn fixture_request(
        team1: Option<String>,
        team2: Option<String>,
    ) -> Result<Option<(String, String)>> {
        match (team1, team2) {
            (Some(team1), Some(team2)) => Ok(Some((team1, team2))),
            (None, None) => Ok(None),
            (Some(team), None) | (None, Some(team)) => Err(ForecastError::InvalidArgument(format!(
                "a fixture needs two teams, got only {}",
                team
            ))),
        }
    }

    pub(crate) fn render(
        predictions: &[Prediction],
        fixture: bool,
        format: &OutputFormat,
        threshold: f64,
    ) -> Result<String> {
        let text = match format {
            OutputFormat::Table if fixture => predictions.iter().map(format_prediction).collect(),
            OutputFormat::Table => format_table(predictions, threshold),
            OutputFormat::Json => serde_json::to_string_pretty(predictions)?,
            OutputFormat::Csv => {
                let mut buf = Vec::new();
                write_predictions_csv(predictions, threshold, &mut buf)?;
                String::from_utf8(buf).map_err(|e| ForecastError::Parse(e.to_string()))?
            }
        };
        Ok(text)
    }

    fn emit(
        config: &Config,
        predictions: &[Prediction],
        fixture: bool,
        out: Option<String>,
        format: OutputFormat,
    ) -> Result<()> {
        let text = render(predictions, fixture, &format, config.evaluation.decision_threshold)?;

        match out {
            Some(path) => {
                std::fs::write(&path, text)?;
                println!("Wrote {} predictions to {}", predictions.len(), path);
            }
            None => print!("{}", text),
        }
        Ok(())
    }

    pub fn test_tail(
        config: &Config,
        last_n: Option<usize>,
        threshold: Option<f64>,
        out: Option<String>,
    ) -> Result<()> {
        let threshold = threshold.unwrap_or(config.evaluation.decision_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ForecastError::InvalidArgument(format!(
                "threshold must be in [0, 1], got {}",
                threshold
            )));
        }

        let predictor = Predictor::load(Path::new(&config.data.model_path), &config.model)?;
        let log = load_labeled(config)?;
        let (split, test) = predictor.test_block(log.records(), &config.split)?;
        let rows = tail(&test, last_n);

        println!(
            "Test block: rows {}..{} ({} matches), showing {}",
            split.start,
            split.total,
            split.n_test(),
            rows.len()
        );
        print!("{}", format_table(rows, threshold));

        let correct = rows.iter().filter(|p| p.is_correct(threshold) == Some(true)).count();
        if !rows.is_empty() {
            println!(
                "\nCorrect: {}/{} ({:.1}%) at threshold {}",
                correct,
                rows.len(),
                correct as f64 / rows.len() as f64 * 100.0,
                threshold
            );
        }

        if let Some(path) = out {
            write_predictions_csv(rows, threshold, create_file(Path::new(&path))?)?;
            println!("Saved to {}", path);
        }
        Ok(())
    }

    pub fn export_test(config: &Config, out: Option<String>) -> Result<()> {
        let predictor = Predictor::load(Path::new(&config.data.model_path), &config.model)?;
        let log = load_labeled(config)?;
        let (split, test) = predictor.test_block(log.records(), &config.split)?;

        let out = out
            .map(PathBuf::from)
            .unwrap_or_else(|| artifact(config, "test_predictions.csv"));
        write_predictions_csv(&test, config.evaluation.decision_threshold, create_file(&out)?)?;
        println!(
            "Exported {} test rows (from row {}) to {}",
            test.len(),
            split.start,
            out.display()
        );
        Ok(())
    }

    pub fn evaluate(config: &Config, out_dir: Option<String>, trailing_rows: Option<usize>) -> Result<()> {
        let mut split_config = config.split.clone();
        if trailing_rows.is_some() {
            split_config.trailing_row_override = trailing_rows;
        }

        let predictor = Predictor::load(Path::new(&config.data.model_path), &config.model)?;
        let log = load_labeled(config)?;
        let (split, test) = predictor.test_block(log.records(), &split_config)?;

        let probs: Vec<f64> = test.iter().map(|p| p.p_team1_win).collect();
        let labels = test
            .iter()
            .map(|p| p.team1_win)
            .collect::<Option<Vec<bool>>>()
            .ok_or_else(|| ForecastError::Input("test block contains unlabeled matches".to_string()))?;

        let report = Evaluator::from_config(&config.evaluation).evaluate(&probs, &labels)?;

        let out_dir = PathBuf::from(out_dir.unwrap_or_else(|| config.data.artifacts_dir.clone()));
        std::fs::create_dir_all(&out_dir)?;
        write_json(&out_dir.join("test_metrics.json"), &report)?;
        write_calibration_csv(
            &report.calibration,
            create_file(&out_dir.join("calibration_curve.csv"))?,
        )?;
        write_predictions_csv(
            &test,
            config.evaluation.decision_threshold,
            create_file(&out_dir.join("test_timeseries.csv"))?,
        )?;

        println!(
            "Evaluation of {} on rows {}..{}",
            predictor.kind(),
            split.start,
            split.total
        );
        println!("───────────────────────────────");
        println!("  {}", report);
        println!("\nCalibration:");
        println!("  {:>8} {:>8} {:>10} {:>10} {:>6}", "lower", "upper", "predicted", "observed", "n");
        for bin in &report.calibration {
            println!(
                "  {:>8.3} {:>8.3} {:>10.3} {:>10.3} {:>6}",
                bin.lower, bin.upper, bin.mean_predicted, bin.observed_fraction, bin.count
            );
        }
        println!("\nArtifacts written to {}", out_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::commands::{fixture_request, render};
    use super::*;
    use elo_forecast::features::EloFeatures;
    use elo_forecast::Prediction;

    fn prediction(team1: &str, team2: &str, p: f64) -> Prediction {
        Prediction {
            match_id: Some("1".to_string()),
            date: None,
            team1: team1.into(),
            team2: team2.into(),
            features: EloFeatures::from_ratings(1516.0, 1484.0),
            p_team1_win: p,
            team1_win: Some(true),
        }
    }

    #[test]
    fn test_fixture_needs_both_teams() {
        assert_eq!(fixture_request(None, None).unwrap(), None);
        assert_eq!(
            fixture_request(Some("A".into()), Some("B".into())).unwrap(),
            Some(("A".to_string(), "B".to_string()))
        );
        assert!(fixture_request(Some("A".into()), None).is_err());
        assert!(fixture_request(None, Some("B".into())).is_err());
    }

    #[test]
    fn test_single_row_log_renders_as_table() {
        let preds = [prediction("Lions", "Tigers", 0.6)];
        let table = render(&preds, false, &OutputFormat::Table, 0.5).unwrap();
        assert!(table.starts_with("match_id"));
        assert_eq!(table.lines().count(), 2);

        let boxed = render(&preds, true, &OutputFormat::Table, 0.5).unwrap();
        assert!(boxed.contains("Lions vs Tigers"));
        assert!(!boxed.contains("match_id"));
    }

    #[test]
    fn test_csv_output() {
        let preds = [prediction("Lions", "Tigers", 0.25)];
        let csv = render(&preds, false, &OutputFormat::Csv, 0.5).unwrap();
        assert_eq!(csv.lines().nth(1), Some("1,,Lions,Tigers,1516.0,1484.0,32.0,0.25,0,1,0"));
    }
}
