use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;

use atp_matchup::Engine;
use atp_matchup::config::AppConfig;
use atp_matchup::predictor::{MatchupPrediction, PlayerSnapshot};
use atp_matchup::telemetry::init_logging;

const RECENT_MEETINGS: usize = 5;

/// Win probabilities for a match between two players.
#[derive(Parser, Debug)]
#[command(name = "predict")]
struct Args {
    player_a: String,
    player_b: String,

    #[arg(long, env = "ATP_DB_PATH")]
    db: Option<PathBuf>,

    #[arg(long, env = "ATP_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Also show the leakage-free h2h and form values as of this date (YYYY-MM-DD).
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Print one JSON object instead of text.
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct PredictionOutput<'a> {
    player_a: &'a PlayerSnapshot,
    player_b: &'a PlayerSnapshot,
    h2h_winrate_a: f64,
    h2h_winrate_b: f64,
    prediction: MatchupPrediction,
    #[serde(skip_serializing_if = "Option::is_none")]
    as_of: Option<AsOfOutput>,
}

#[derive(Serialize)]
struct AsOfOutput {
    date: NaiveDate,
    form_window: usize,
    h2h_winrate_a: f64,
    h2h_winrate_b: f64,
    recent_winrate_a: f64,
    recent_winrate_b: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = AppConfig::from_env();
    if let Some(db) = args.db {
        config.db_path = db;
    }
    if let Some(model) = args.model {
        config.model_path = model;
    }
    let engine = Engine::open(&config)?;

    let a = args.player_a.trim();
    let b = args.player_b.trim();
    let stats_a = engine.get_player_stats(a)?;
    let stats_b = engine.get_player_stats(b)?;
    let prediction = engine.predict_win_probability(a, b)?;
    let h2h_a = engine.calculate_h2h_winrate(a, b);
    let h2h_b = engine.calculate_h2h_winrate(b, a);
    let as_of = args.as_of.map(|date| AsOfOutput {
        date,
        form_window: engine.form_window(),
        h2h_winrate_a: engine.h2h_winrate_as_of(a, b, date),
        h2h_winrate_b: engine.h2h_winrate_as_of(b, a, date),
        recent_winrate_a: engine.recent_winrate_as_of(a, date),
        recent_winrate_b: engine.recent_winrate_as_of(b, date),
    });

    if args.json {
        let out = PredictionOutput {
            player_a: stats_a,
            player_b: stats_b,
            h2h_winrate_a: h2h_a,
            h2h_winrate_b: h2h_b,
            prediction,
            as_of,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for (stats, h2h, opponent) in [(stats_a, h2h_a, b), (stats_b, h2h_b, a)] {
        println!("{} (as of {})", stats.name, stats.as_of);
        println!("  rank: {}", stats.rank);
        println!("  age: {}", stats.age.trunc());
        println!("  height: {} cm", stats.height);
        println!("  hand: {}", stats.hand);
        println!("  recent winrate: {:.1}%", stats.recent_winrate * 100.0);
        println!("  h2h winrate vs {opponent}: {:.1}%", h2h * 100.0);
    }
    println!();
    println!("{a}: {:.1}%", prediction.prob_a * 100.0);
    println!("{b}: {:.1}%", prediction.prob_b * 100.0);

    if let Some(snap) = &as_of {
        println!();
        println!("Before {} (form window {}):", snap.date, snap.form_window);
        println!(
            "  {a}: h2h {:.1}%, recent {:.1}%",
            snap.h2h_winrate_a * 100.0,
            snap.recent_winrate_a * 100.0
        );
        println!(
            "  {b}: h2h {:.1}%, recent {:.1}%",
            snap.h2h_winrate_b * 100.0,
            snap.recent_winrate_b * 100.0
        );
    }

    let meetings = engine.recent_h2h(a, b, RECENT_MEETINGS);
    if meetings.is_empty() {
        println!("No historical H2H matches found.");
    } else {
        println!();
        println!("Last {} H2H matches:", meetings.len());
        for m in meetings {
            println!(
                "  {}  {:<28} {} d. {}  {}",
                m.date,
                m.tournament,
                m.winner.name,
                m.loser.name,
                m.score.as_deref().unwrap_or("")
            );
        }
    }
    Ok(())
}
