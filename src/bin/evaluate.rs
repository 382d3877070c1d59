use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use atp_matchup::classifier::load_model;
use atp_matchup::config::AppConfig;
use atp_matchup::evaluation::{DEFAULT_CALIBRATION_BINS, evaluate_rows};
use atp_matchup::store;
use atp_matchup::telemetry::init_logging;
use atp_matchup::training::chronological_split;

/// Score the held-out tail of the feature table, raw vs symmetric.
#[derive(Parser, Debug)]
#[command(name = "evaluate")]
struct Args {
    #[arg(long, env = "ATP_DB_PATH")]
    db: Option<PathBuf>,

    #[arg(long, env = "ATP_MODEL_PATH")]
    model: Option<PathBuf>,

    #[arg(long, default_value_t = 0.2)]
    validation_fraction: f64,

    #[arg(long, default_value_t = DEFAULT_CALIBRATION_BINS)]
    bins: usize,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = AppConfig::from_env();
    let db_path = args.db.unwrap_or(config.db_path);
    let model_path = args.model.unwrap_or(config.model_path);

    let conn = store::open_db(&db_path)?;
    let rows = store::load_feature_rows(&conn)?;
    let model = load_model(&model_path)?;

    let (_, validation) = chronological_split(&rows, args.validation_fraction);
    if validation.is_empty() {
        bail!("no validation rows in {}", db_path.display());
    }
    let report = evaluate_rows(&model, validation, args.bins);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Validation: {} matches from {} to {}",
        report.matches,
        validation[0].record.date,
        validation[validation.len() - 1].record.date
    );
    if report.skipped > 0 {
        println!("Skipped: {}", report.skipped);
    }
    for (label, m) in [("raw", report.raw), ("symmetric", report.symmetric)] {
        println!(
            "{label:<10} n={} brier={:.4} logloss={:.4} acc={:.3}",
            m.samples, m.brier, m.log_loss, m.accuracy
        );
    }
    println!("Base-rate logloss: {:.4}", report.base_rate_log_loss);
    println!("Mean asymmetry |raw_a - (1 - raw_b)|: {:.4}", report.mean_asymmetry);

    println!("Calibration (symmetric):");
    for bin in &report.calibration {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  [{:.2}, {:.2})  n={:<6} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }
    Ok(())
}
