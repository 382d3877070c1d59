use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Datelike;
use serde::Serialize;

use crate::corpus::{Corpus, MatchRecord};
use crate::error::AnalyticsError;

/// Opponents need at least this many meetings to rank as toughest or easiest.
pub const MIN_OPPONENT_MATCHES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CareerSummary {
    pub player: String,
    pub matches: u32,
    pub wins: u32,
    pub losses: u32,
    /// Percentage, rounded to two decimals.
    pub winrate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearRecord {
    pub year: i32,
    pub matches: u32,
    pub wins: u32,
    pub winrate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceWins {
    pub surface: String,
    pub wins: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpponentRecord {
    pub opponent: String,
    pub matches: u32,
    pub wins: u32,
    pub winrate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonWinner {
    pub player: String,
    pub wins: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OpponentBreakdown {
    pub records: Vec<OpponentRecord>,
}

impl OpponentBreakdown {
    pub fn most_played(&self, n: usize) -> Vec<OpponentRecord> {
        let mut out = self.records.clone();
        out.sort_by(|a, b| {
            b.matches
                .cmp(&a.matches)
                .then_with(|| a.opponent.cmp(&b.opponent))
        });
        out.truncate(n);
        out
    }

    /// Lowest win rate first among opponents met at least `min_matches` times.
    pub fn toughest(&self, n: usize, min_matches: u32) -> Vec<OpponentRecord> {
        self.ranked_by_winrate(n, min_matches, |a, b| a.total_cmp(b))
    }

    pub fn easiest(&self, n: usize, min_matches: u32) -> Vec<OpponentRecord> {
        self.ranked_by_winrate(n, min_matches, |a, b| b.total_cmp(a))
    }

    fn ranked_by_winrate(
        &self,
        n: usize,
        min_matches: u32,
        order: impl Fn(&f64, &f64) -> Ordering,
    ) -> Vec<OpponentRecord> {
        let mut out = self
            .records
            .iter()
            .filter(|r| r.matches >= min_matches)
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|a, b| {
            order(&a.winrate_pct, &b.winrate_pct)
                .then_with(|| b.matches.cmp(&a.matches))
                .then_with(|| a.opponent.cmp(&b.opponent))
        });
        out.truncate(n);
        out
    }
}

/// Everything the player report shows, gathered in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerReport {
    pub summary: CareerSummary,
    pub by_year: Vec<YearRecord>,
    pub by_surface: Vec<SurfaceWins>,
    pub recent_matches: Vec<MatchRecord>,
    pub opponents: OpponentBreakdown,
}

pub fn career_summary(corpus: &Corpus, player: &str) -> Result<CareerSummary, AnalyticsError> {
    let matches = player_matches(corpus, player)?;
    let wins = matches.iter().filter(|m| m.winner.name == player).count() as u32;
    let total = matches.len() as u32;
    Ok(CareerSummary {
        player: player.to_string(),
        matches: total,
        wins,
        losses: total - wins,
        winrate_pct: pct(wins, total),
    })
}

pub fn winrate_by_year(corpus: &Corpus, player: &str) -> Result<Vec<YearRecord>, AnalyticsError> {
    let mut years: BTreeMap<i32, (u32, u32)> = BTreeMap::new();
    for m in player_matches(corpus, player)? {
        let entry = years.entry(m.date.year()).or_default();
        entry.0 += 1;
        if m.winner.name == player {
            entry.1 += 1;
        }
    }
    Ok(years
        .into_iter()
        .map(|(year, (matches, wins))| YearRecord {
            year,
            matches,
            wins,
            winrate_pct: pct(wins, matches),
        })
        .collect())
}

/// Wins per surface, most first. Matches without a surface are skipped.
pub fn wins_by_surface(corpus: &Corpus, player: &str) -> Result<Vec<SurfaceWins>, AnalyticsError> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for m in player_matches(corpus, player)? {
        if m.winner.name != player {
            continue;
        }
        if let Some(surface) = m.surface.as_deref() {
            *counts.entry(surface).or_default() += 1;
        }
    }
    let mut out = counts
        .into_iter()
        .map(|(surface, wins)| SurfaceWins {
            surface: surface.to_string(),
            wins,
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.surface.cmp(&b.surface)));
    Ok(out)
}

/// Up to `n` matches, wins before losses, newest first within each group.
pub fn recent_matches(
    corpus: &Corpus,
    player: &str,
    n: usize,
) -> Result<Vec<MatchRecord>, AnalyticsError> {
    let mut matches = player_matches(corpus, player)?;
    // Reverse first so same-day matches come out latest-loaded first.
    matches.reverse();
    matches.sort_by_key(|m| (m.winner.name != player, Reverse(m.date)));
    Ok(matches.into_iter().take(n).cloned().collect())
}

pub fn opponent_breakdown(
    corpus: &Corpus,
    player: &str,
) -> Result<OpponentBreakdown, AnalyticsError> {
    let mut per_opponent: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for m in player_matches(corpus, player)? {
        let Some((_, opponent, won)) = m.sides_for(player) else {
            continue;
        };
        let entry = per_opponent.entry(opponent.name.as_str()).or_default();
        entry.0 += 1;
        if won {
            entry.1 += 1;
        }
    }
    Ok(OpponentBreakdown {
        records: per_opponent
            .into_iter()
            .map(|(opponent, (matches, wins))| OpponentRecord {
                opponent: opponent.to_string(),
                matches,
                wins,
                winrate_pct: pct(wins, matches),
            })
            .collect(),
    })
}

/// Players with the most wins in `year`, ties broken by name.
pub fn top_winners(corpus: &Corpus, year: i32, n: usize) -> Vec<SeasonWinner> {
    let mut wins: HashMap<&str, u32> = HashMap::new();
    for m in corpus.matches().iter().filter(|m| m.date.year() == year) {
        *wins.entry(m.winner.name.as_str()).or_default() += 1;
    }
    let mut out = wins
        .into_iter()
        .map(|(player, wins)| SeasonWinner {
            player: player.to_string(),
            wins,
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.player.cmp(&b.player)));
    out.truncate(n);
    out
}

pub fn players_active_in(corpus: &Corpus, year: i32) -> Vec<String> {
    corpus
        .matches()
        .iter()
        .filter(|m| m.date.year() == year)
        .flat_map(|m| [m.winner.name.as_str(), m.loser.name.as_str()])
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Last `n` meetings between `a` and `b`, newest first. Empty when they never met.
pub fn recent_h2h(corpus: &Corpus, a: &str, b: &str, n: usize) -> Vec<MatchRecord> {
    corpus
        .matches()
        .iter()
        .rev()
        .filter(|m| m.is_between(a, b))
        .take(n)
        .cloned()
        .collect()
}

pub fn player_report(
    corpus: &Corpus,
    player: &str,
    recent: usize,
) -> Result<PlayerReport, AnalyticsError> {
    Ok(PlayerReport {
        summary: career_summary(corpus, player)?,
        by_year: winrate_by_year(corpus, player)?,
        by_surface: wins_by_surface(corpus, player)?,
        recent_matches: recent_matches(corpus, player, recent)?,
        opponents: opponent_breakdown(corpus, player)?,
    })
}

fn player_matches<'a>(
    corpus: &'a Corpus,
    player: &str,
) -> Result<Vec<&'a MatchRecord>, AnalyticsError> {
    let matches = corpus
        .matches()
        .iter()
        .filter(|m| m.involves(player))
        .collect::<Vec<_>>();
    if matches.is_empty() {
        return Err(AnalyticsError::player_not_found(player));
    }
    Ok(matches)
}

fn pct(wins: u32, matches: u32) -> f64 {
    if matches == 0 {
        return 0.0;
    }
    (f64::from(wins) / f64::from(matches) * 10_000.0).round() / 100.0
}
