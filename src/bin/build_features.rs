use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use atp_matchup::config::AppConfig;
use atp_matchup::corpus::load_corpus_dir;
use atp_matchup::features::assemble_feature_table;
use atp_matchup::store;
use atp_matchup::telemetry::init_logging;

/// Load season CSVs, compute leakage-free features and replace the feature store.
#[derive(Parser, Debug)]
#[command(name = "build_features")]
struct Args {
    /// Directory holding one CSV per season.
    #[arg(long, env = "ATP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// SQLite feature store to (re)write.
    #[arg(long, env = "ATP_DB_PATH")]
    db: Option<PathBuf>,

    /// Trailing window for recent form.
    #[arg(long, env = "ATP_FORM_WINDOW")]
    window: Option<usize>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = AppConfig::from_env();
    let data_dir = args.data_dir.unwrap_or(config.data_dir);
    let db_path = args.db.unwrap_or(config.db_path);
    let window = args.window.unwrap_or(config.form_window).max(1);

    let (corpus, summary) = load_corpus_dir(&data_dir)?;
    let table = assemble_feature_table(&corpus, window);

    let mut conn = store::open_db(&db_path)?;
    let run = store::replace_all(
        &mut conn,
        &corpus,
        &table,
        summary.files.len(),
        summary.rows_read,
        window,
    )?;

    println!("Feature build complete");
    println!("DB: {}", db_path.display());
    println!("Files: {}", summary.files.len());
    println!(
        "Rows: read={} kept={} bad_date={} missing_players={} undecodable={}",
        summary.rows_read,
        summary.rows_kept,
        summary.dropped_bad_date,
        summary.dropped_missing_players,
        summary.dropped_undecodable
    );
    println!(
        "Feature rows: {} (dropped incomplete: {})",
        run.feature_rows, run.dropped_incomplete
    );
    println!("Form window: {}", run.form_window);
    if let Some(latest) = corpus.latest_date() {
        println!("Latest match: {latest}");
    }
    Ok(())
}
