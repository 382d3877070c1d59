use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hand {
    Right,
    Left,
    Ambidextrous,
    Unknown,
}

impl Hand {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "R" => Some(Hand::Right),
            "L" => Some(Hand::Left),
            "A" => Some(Hand::Ambidextrous),
            "U" => Some(Hand::Unknown),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            Hand::Right => 'R',
            Hand::Left => 'L',
            Hand::Ambidextrous => 'A',
            Hand::Unknown => 'U',
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One side of a match as recorded at the time it was played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLine {
    pub name: String,
    pub rank: Option<f64>,
    pub rank_points: Option<f64>,
    pub age: Option<f64>,
    pub height: Option<f64>,
    pub hand: Option<Hand>,
}

impl PlayerLine {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rank: None,
            rank_points: None,
            age: None,
            height: None,
            hand: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub tournament: String,
    pub surface: Option<String>,
    pub winner: PlayerLine,
    pub loser: PlayerLine,
    pub score: Option<String>,
}

impl MatchRecord {
    pub fn involves(&self, player: &str) -> bool {
        self.winner.name == player || self.loser.name == player
    }

    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.winner.name == a && self.loser.name == b)
            || (self.winner.name == b && self.loser.name == a)
    }

    /// The line for `player` and the opponent's line, if `player` took part.
    pub fn sides_for(&self, player: &str) -> Option<(&PlayerLine, &PlayerLine, bool)> {
        if self.winner.name == player {
            Some((&self.winner, &self.loser, true))
        } else if self.loser.name == player {
            Some((&self.loser, &self.winner, false))
        } else {
            None
        }
    }
}

/// Time-ordered match table. Same-date matches keep their load order.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    matches: Vec<MatchRecord>,
}

impl Corpus {
    pub fn from_records(mut matches: Vec<MatchRecord>) -> Self {
        matches.sort_by_key(|m| m.date);
        Self { matches }
    }

    pub fn matches(&self) -> &[MatchRecord] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.matches.last().map(|m| m.date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub files: Vec<PathBuf>,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub dropped_bad_date: usize,
    pub dropped_missing_players: usize,
    pub dropped_undecodable: usize,
}

impl LoadSummary {
    pub fn dropped(&self) -> usize {
        self.dropped_bad_date + self.dropped_missing_players + self.dropped_undecodable
    }
}

#[derive(Debug, Deserialize)]
struct RawMatchRow {
    #[serde(default)]
    tourney_date: String,
    #[serde(default)]
    tourney_name: String,
    #[serde(default)]
    surface: String,
    #[serde(default)]
    winner_name: String,
    #[serde(default)]
    loser_name: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    winner_rank: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loser_rank: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    winner_rank_points: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loser_rank_points: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    winner_age: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loser_age: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    winner_ht: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loser_ht: Option<f64>,
    #[serde(default)]
    winner_hand: String,
    #[serde(default)]
    loser_hand: String,
    #[serde(default)]
    score: String,
}

/// Loads every `*.csv` under `dir` (file-name order) into one time-ordered corpus.
pub fn load_corpus_dir(dir: &Path) -> Result<(Corpus, LoadSummary)> {
    let mut files = std::fs::read_dir(dir)
        .with_context(|| format!("read match directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect::<Vec<_>>();
    files.sort();
    if files.is_empty() {
        return Err(anyhow!("no csv files found in {}", dir.display()));
    }

    let mut summary = LoadSummary::default();
    let mut records = Vec::new();
    for path in &files {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let before = summary.rows_kept;
        records.extend(
            read_matches(file, &mut summary)
                .with_context(|| format!("read matches from {}", path.display()))?,
        );
        debug!(
            file = %path.display(),
            kept = summary.rows_kept - before,
            "loaded season file"
        );
    }
    summary.files = files;

    info!(
        files = summary.files.len(),
        rows_read = summary.rows_read,
        rows_kept = summary.rows_kept,
        dropped = summary.dropped(),
        "match corpus loaded"
    );
    Ok((Corpus::from_records(records), summary))
}

/// Decodes match rows from CSV. Rows that cannot be used are counted in `summary`
/// and skipped; only a broken header or I/O failure is an error.
pub fn read_matches<R: Read>(rdr: R, summary: &mut LoadSummary) -> Result<Vec<MatchRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    reader.headers().context("read csv header")?;

    let mut out = Vec::new();
    for row in reader.deserialize::<RawMatchRow>() {
        summary.rows_read += 1;
        let raw = match row {
            Ok(raw) => raw,
            Err(err) => {
                debug!(%err, "dropping undecodable match row");
                summary.dropped_undecodable += 1;
                continue;
            }
        };
        let Some(date) = parse_compact_date(&raw.tourney_date) else {
            summary.dropped_bad_date += 1;
            continue;
        };
        let winner_name = raw.winner_name.trim();
        let loser_name = raw.loser_name.trim();
        if winner_name.is_empty() || loser_name.is_empty() || winner_name == loser_name {
            summary.dropped_missing_players += 1;
            continue;
        }

        out.push(MatchRecord {
            date,
            tournament: raw.tourney_name.trim().to_string(),
            surface: non_empty(&raw.surface),
            winner: PlayerLine {
                name: winner_name.to_string(),
                rank: raw.winner_rank,
                rank_points: raw.winner_rank_points,
                age: raw.winner_age,
                height: raw.winner_ht,
                hand: Hand::parse(&raw.winner_hand),
            },
            loser: PlayerLine {
                name: loser_name.to_string(),
                rank: raw.loser_rank,
                rank_points: raw.loser_rank_points,
                age: raw.loser_age,
                height: raw.loser_ht,
                hand: Hand::parse(&raw.loser_hand),
            },
            score: non_empty(&raw.score),
        });
        summary.rows_kept += 1;
    }
    Ok(out)
}

/// Parses an 8-digit `YYYYMMDD` date. Float exports such as `20240101.0` are accepted.
pub fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let s = s.strip_suffix(".0").unwrap_or(s);
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse::<i32>().ok()?;
    let month = s[4..6].parse::<u32>().ok()?;
    let day = s[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
