use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use tracing::info;

use crate::corpus::{Corpus, Hand, MatchRecord, PlayerLine};
use crate::features::{FeatureRow, FeatureTable, FeatureVector, HandMatchup};

const MATCH_COLUMNS: &str = "m.seq, m.tourney_date, m.tourney_name, m.surface, \
     m.winner_name, m.winner_rank, m.winner_rank_points, m.winner_age, m.winner_ht, m.winner_hand, \
     m.loser_name, m.loser_rank, m.loser_rank_points, m.loser_age, m.loser_ht, m.loser_hand, \
     m.score";
const MATCH_COLUMN_COUNT: usize = 17;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildRun {
    pub built_at: String,
    pub source_files: usize,
    pub rows_read: usize,
    pub matches: usize,
    pub feature_rows: usize,
    pub dropped_incomplete: usize,
    pub form_window: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            seq INTEGER PRIMARY KEY,
            tourney_date TEXT NOT NULL,
            tourney_name TEXT NOT NULL,
            surface TEXT NULL,
            winner_name TEXT NOT NULL,
            winner_rank REAL NULL,
            winner_rank_points REAL NULL,
            winner_age REAL NULL,
            winner_ht REAL NULL,
            winner_hand TEXT NULL,
            loser_name TEXT NOT NULL,
            loser_rank REAL NULL,
            loser_rank_points REAL NULL,
            loser_age REAL NULL,
            loser_ht REAL NULL,
            loser_hand TEXT NULL,
            score TEXT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(tourney_date);
        CREATE INDEX IF NOT EXISTS idx_matches_winner ON matches(winner_name);
        CREATE INDEX IF NOT EXISTS idx_matches_loser ON matches(loser_name);

        CREATE TABLE IF NOT EXISTS match_features (
            seq INTEGER PRIMARY KEY REFERENCES matches(seq),
            winner_recent_winrate REAL NOT NULL,
            loser_recent_winrate REAL NOT NULL,
            h2h_winrate REAL NOT NULL,
            ranking_diff REAL NOT NULL,
            rank_points_diff REAL NOT NULL,
            age_diff REAL NOT NULL,
            height_diff REAL NOT NULL,
            same_hand INTEGER NOT NULL,
            hand_matchup TEXT NOT NULL,
            recent_winrate_diff REAL NOT NULL
        );

        CREATE VIEW IF NOT EXISTS feature_dataset AS
            SELECT m.*, f.winner_recent_winrate, f.loser_recent_winrate, f.h2h_winrate,
                   f.ranking_diff, f.rank_points_diff, f.age_diff, f.height_diff,
                   f.same_hand, f.hand_matchup, f.recent_winrate_diff
            FROM matches m JOIN match_features f ON f.seq = m.seq;

        CREATE TABLE IF NOT EXISTS build_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            built_at TEXT NOT NULL,
            source_files INTEGER NOT NULL,
            rows_read INTEGER NOT NULL,
            matches INTEGER NOT NULL,
            feature_rows INTEGER NOT NULL,
            dropped_incomplete INTEGER NOT NULL,
            form_window INTEGER NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Replaces the stored corpus and feature table wholesale.
pub fn replace_all(
    conn: &mut Connection,
    corpus: &Corpus,
    table: &FeatureTable,
    source_files: usize,
    rows_read: usize,
    form_window: usize,
) -> Result<BuildRun> {
    let tx = conn.transaction().context("begin feature store transaction")?;
    tx.execute("DELETE FROM match_features", [])
        .context("clear match_features")?;
    tx.execute("DELETE FROM matches", []).context("clear matches")?;

    {
        let mut insert_match = tx
            .prepare_cached(
                r#"
                INSERT INTO matches (
                    seq, tourney_date, tourney_name, surface,
                    winner_name, winner_rank, winner_rank_points, winner_age, winner_ht, winner_hand,
                    loser_name, loser_rank, loser_rank_points, loser_age, loser_ht, loser_hand,
                    score
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
            )
            .context("prepare match insert")?;
        for (seq, m) in corpus.matches().iter().enumerate() {
            insert_match
                .execute(params![
                    seq as i64,
                    m.date,
                    m.tournament,
                    m.surface,
                    m.winner.name,
                    m.winner.rank,
                    m.winner.rank_points,
                    m.winner.age,
                    m.winner.height,
                    hand_code(m.winner.hand),
                    m.loser.name,
                    m.loser.rank,
                    m.loser.rank_points,
                    m.loser.age,
                    m.loser.height,
                    hand_code(m.loser.hand),
                    m.score,
                ])
                .context("insert match")?;
        }

        let mut insert_features = tx
            .prepare_cached(
                r#"
                INSERT INTO match_features (
                    seq, winner_recent_winrate, loser_recent_winrate, h2h_winrate,
                    ranking_diff, rank_points_diff, age_diff, height_diff,
                    same_hand, hand_matchup, recent_winrate_diff
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .context("prepare feature insert")?;
        for row in &table.rows {
            let f = &row.features;
            insert_features
                .execute(params![
                    row.seq as i64,
                    row.winner_recent_winrate,
                    row.loser_recent_winrate,
                    row.h2h_winrate,
                    f.ranking_diff,
                    f.rank_points_diff,
                    f.age_diff,
                    f.height_diff,
                    i64::from(f.same_hand),
                    f.hand_matchup.label(),
                    f.recent_winrate_diff,
                ])
                .context("insert feature row")?;
        }
    }

    let run = BuildRun {
        built_at: Utc::now().to_rfc3339(),
        source_files,
        rows_read,
        matches: corpus.len(),
        feature_rows: table.rows.len(),
        dropped_incomplete: table.dropped_incomplete,
        form_window,
    };
    tx.execute(
        "INSERT INTO build_runs(built_at, source_files, rows_read, matches, feature_rows, dropped_incomplete, form_window)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.built_at,
            run.source_files as i64,
            run.rows_read as i64,
            run.matches as i64,
            run.feature_rows as i64,
            run.dropped_incomplete as i64,
            run.form_window as i64,
        ],
    )
    .context("insert build run")?;
    tx.commit().context("commit feature store transaction")?;

    info!(
        matches = run.matches,
        feature_rows = run.feature_rows,
        "feature store replaced"
    );
    Ok(run)
}

pub fn load_corpus(conn: &Connection) -> Result<Corpus> {
    let sql = format!("SELECT {MATCH_COLUMNS} FROM matches m ORDER BY m.seq ASC");
    let mut stmt = conn.prepare(&sql).context("prepare load matches query")?;
    let rows = stmt
        .query_map([], |row| match_from_row(row))
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(Corpus::from_records(out))
}

pub fn load_feature_rows(conn: &Connection) -> Result<Vec<FeatureRow>> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS}, \
             f.winner_recent_winrate, f.loser_recent_winrate, f.h2h_winrate, \
             f.ranking_diff, f.rank_points_diff, f.age_diff, f.height_diff, \
             f.same_hand, f.hand_matchup, f.recent_winrate_diff \
         FROM matches m JOIN match_features f ON f.seq = m.seq \
         ORDER BY m.seq ASC"
    );
    let mut stmt = conn.prepare(&sql).context("prepare load features query")?;
    let rows = stmt
        .query_map([], |row| {
            let record = match_from_row(row)?;
            let base = MATCH_COLUMN_COUNT;
            let matchup_idx = base + 8;
            let matchup_raw: String = row.get(matchup_idx)?;
            let hand_matchup = HandMatchup::parse(&matchup_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    matchup_idx,
                    Type::Text,
                    format!("bad hand matchup {matchup_raw:?}").into(),
                )
            })?;
            Ok(FeatureRow {
                seq: row.get::<_, i64>(0)? as usize,
                record,
                winner_recent_winrate: row.get(base)?,
                loser_recent_winrate: row.get(base + 1)?,
                h2h_winrate: row.get(base + 2)?,
                features: FeatureVector {
                    ranking_diff: row.get(base + 3)?,
                    rank_points_diff: row.get(base + 4)?,
                    age_diff: row.get(base + 5)?,
                    height_diff: row.get(base + 6)?,
                    same_hand: row.get::<_, i64>(base + 7)? != 0,
                    hand_matchup,
                    h2h_winrate: row.get(base + 2)?,
                    recent_winrate_diff: row.get(base + 9)?,
                },
            })
        })
        .context("query load features")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode feature row")?);
    }
    Ok(out)
}

pub fn latest_build(conn: &Connection) -> Result<Option<BuildRun>> {
    let mut stmt = conn
        .prepare(
            "SELECT built_at, source_files, rows_read, matches, feature_rows, dropped_incomplete, form_window
             FROM build_runs ORDER BY run_id DESC LIMIT 1",
        )
        .context("prepare latest build query")?;
    let mut rows = stmt
        .query_map([], |row| {
            Ok(BuildRun {
                built_at: row.get(0)?,
                source_files: row.get::<_, i64>(1)? as usize,
                rows_read: row.get::<_, i64>(2)? as usize,
                matches: row.get::<_, i64>(3)? as usize,
                feature_rows: row.get::<_, i64>(4)? as usize,
                dropped_incomplete: row.get::<_, i64>(5)? as usize,
                form_window: row.get::<_, i64>(6)? as usize,
            })
        })
        .context("query latest build")?;
    rows.next()
        .transpose()
        .context("decode build run")
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<MatchRecord> {
    let date: NaiveDate = row.get(1)?;
    Ok(MatchRecord {
        date,
        tournament: row.get(2)?,
        surface: row.get(3)?,
        winner: PlayerLine {
            name: row.get(4)?,
            rank: row.get(5)?,
            rank_points: row.get(6)?,
            age: row.get(7)?,
            height: row.get(8)?,
            hand: row.get::<_, Option<String>>(9)?.as_deref().and_then(Hand::parse),
        },
        loser: PlayerLine {
            name: row.get(10)?,
            rank: row.get(11)?,
            rank_points: row.get(12)?,
            age: row.get(13)?,
            height: row.get(14)?,
            hand: row.get::<_, Option<String>>(15)?.as_deref().and_then(Hand::parse),
        },
        score: row.get(16)?,
    })
}

fn hand_code(hand: Option<Hand>) -> Option<String> {
    hand.map(|h| h.code().to_string())
}
