use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;

use atp_matchup::career::{self, MIN_OPPONENT_MATCHES, OpponentRecord};
use atp_matchup::config::AppConfig;
use atp_matchup::report_export::export_player_report;
use atp_matchup::store;
use atp_matchup::telemetry::init_logging;

const LIST_LEN: usize = 5;

/// Career report for one player, or the season overview with `--year`.
#[derive(Parser, Debug)]
#[command(name = "player_report")]
struct Args {
    player: Option<String>,

    /// Show the top winners and active players of a season.
    #[arg(long)]
    year: Option<i32>,

    #[arg(long, default_value_t = 20)]
    recent: usize,

    /// Also write the report to this .xlsx workbook.
    #[arg(long)]
    xlsx: Option<PathBuf>,

    #[arg(long, env = "ATP_DB_PATH")]
    db: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.player.is_none() && args.year.is_none() {
        bail!("pass a player name or --year");
    }

    let config = AppConfig::from_env();
    let db_path = args.db.unwrap_or(config.db_path);
    let conn = store::open_db(&db_path)?;
    let corpus = store::load_corpus(&conn)?;

    if let Some(year) = args.year {
        println!("Top {LIST_LEN} players of {year} (by matches won):");
        for w in career::top_winners(&corpus, year, LIST_LEN) {
            println!("  {:<28} {}", w.player, w.wins);
        }
        println!(
            "Players active in {year}: {}",
            career::players_active_in(&corpus, year).len()
        );
    }

    let Some(player) = args.player.as_deref().map(str::trim) else {
        return Ok(());
    };
    let report = career::player_report(&corpus, player, args.recent)?;
    let s = &report.summary;

    println!("{} - Career Summary", s.player);
    println!("Total Matches: {}", s.matches);
    println!("Total Wins: {}", s.wins);
    println!("Overall Winrate: {:.2}%", s.winrate_pct);

    println!("Winrate by Year:");
    for y in &report.by_year {
        println!("  {}  {:>3}/{:<3} {:>6.2}%", y.year, y.wins, y.matches, y.winrate_pct);
    }

    println!("Wins by Surface:");
    for sw in &report.by_surface {
        println!("  {:<8} {}", sw.surface, sw.wins);
    }

    println!("Recent {} Matches (Wins First):", report.recent_matches.len());
    for m in &report.recent_matches {
        println!(
            "  {}  {:<28} {:<6} {} d. {}  {}",
            m.date,
            m.tournament,
            m.surface.as_deref().unwrap_or("-"),
            m.winner.name,
            m.loser.name,
            m.score.as_deref().unwrap_or("")
        );
    }

    print_opponents("Most Played Opponents", &report.opponents.most_played(LIST_LEN));
    print_opponents(
        &format!("Toughest Opponents (min {MIN_OPPONENT_MATCHES} matches)"),
        &report.opponents.toughest(LIST_LEN, MIN_OPPONENT_MATCHES),
    );
    print_opponents(
        &format!("Easiest Opponents (min {MIN_OPPONENT_MATCHES} matches)"),
        &report.opponents.easiest(LIST_LEN, MIN_OPPONENT_MATCHES),
    );

    if let Some(path) = args.xlsx {
        let out = export_player_report(&path, &report)?;
        println!(
            "Workbook written: {} (years={} surfaces={} recent={} opponents={})",
            path.display(),
            out.years,
            out.surfaces,
            out.recent_matches,
            out.opponents
        );
    }
    Ok(())
}

fn print_opponents(title: &str, records: &[OpponentRecord]) {
    println!("{title}:");
    if records.is_empty() {
        println!("  (none)");
    }
    for r in records {
        println!(
            "  {:<28} {:>3}/{:<3} {:>6.2}%",
            r.opponent, r.wins, r.matches, r.winrate_pct
        );
    }
}
