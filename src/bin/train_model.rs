use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use atp_matchup::classifier::save_model;
use atp_matchup::config::AppConfig;
use atp_matchup::features::NUMERIC_FEATURE_NAMES;
use atp_matchup::store;
use atp_matchup::telemetry::init_logging;
use atp_matchup::training::{TrainingConfig, train};

/// Fit the logistic match model on the stored feature table.
#[derive(Parser, Debug)]
#[command(name = "train_model")]
struct Args {
    #[arg(long, env = "ATP_DB_PATH")]
    db: Option<PathBuf>,

    /// Where to write the model artifact.
    #[arg(long, env = "ATP_MODEL_PATH")]
    out: Option<PathBuf>,

    #[arg(long, default_value_t = 0.2)]
    validation_fraction: f64,

    #[arg(long, default_value_t = 400)]
    iterations: usize,

    #[arg(long, default_value_t = 0.5)]
    learning_rate: f64,

    #[arg(long, default_value_t = 1e-3)]
    l2: f64,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = AppConfig::from_env();
    let db_path = args.db.unwrap_or(config.db_path);
    let out = args.out.unwrap_or(config.model_path);

    let conn = store::open_db(&db_path)?;
    let rows = store::load_feature_rows(&conn)?;
    if rows.is_empty() {
        bail!("no feature rows in {}; run build_features first", db_path.display());
    }

    let cfg = TrainingConfig {
        validation_fraction: args.validation_fraction,
        learning_rate: args.learning_rate,
        iterations: args.iterations,
        l2: args.l2,
    };
    let report = train(&rows, &cfg)?;
    save_model(&out, &report.model)?;

    println!("Model written: {}", out.display());
    println!(
        "Samples: train={} val={}",
        report.model.train_samples, report.model.val_samples
    );
    println!(
        "Train: logloss={:.4} brier={:.4} acc={:.3}",
        report.train.log_loss, report.train.brier, report.train.accuracy
    );
    println!(
        "Val:   logloss={:.4} brier={:.4} acc={:.3} (baseline logloss={:.4})",
        report.validation.log_loss,
        report.validation.brier,
        report.validation.accuracy,
        report.baseline_log_loss
    );
    println!("Intercept: {:+.4}", report.model.intercept);
    for (name, coeff) in NUMERIC_FEATURE_NAMES.iter().zip(&report.model.coeffs) {
        println!("  {name:<20} {coeff:+.4}");
    }
    for (label, coeff) in &report.model.hand_matchup_coeffs {
        println!("  hand_matchup={label:<7} {coeff:+.4}");
    }
    Ok(())
}
