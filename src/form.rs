use std::collections::HashMap;

use chrono::NaiveDate;

use crate::corpus::MatchRecord;
use crate::h2h::NEUTRAL_WINRATE;

pub const DEFAULT_FORM_WINDOW: usize = 5;

#[derive(Debug, Clone, Default)]
struct PlayerTimeline {
    dates: Vec<NaiveDate>,
    // wins[i] = wins over the first i matches
    wins: Vec<u32>,
}

/// Trailing win rate per player over their most recent matches.
#[derive(Debug, Clone)]
pub struct RecentFormIndex {
    window: usize,
    players: HashMap<String, PlayerTimeline>,
}

impl RecentFormIndex {
    /// Unpivots every match into a winner record (win) and a loser record (loss).
    pub fn build<'a, I>(matches: I, window: usize) -> Self
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        let mut grouped: HashMap<&str, Vec<(NaiveDate, bool)>> = HashMap::new();
        for m in matches {
            grouped
                .entry(m.winner.name.as_str())
                .or_default()
                .push((m.date, true));
            grouped
                .entry(m.loser.name.as_str())
                .or_default()
                .push((m.date, false));
        }

        let players = grouped
            .into_iter()
            .map(|(name, mut rows)| {
                rows.sort_by_key(|(date, _)| *date);
                let mut dates = Vec::with_capacity(rows.len());
                let mut wins = Vec::with_capacity(rows.len() + 1);
                wins.push(0);
                let mut acc = 0u32;
                for (date, win) in rows {
                    dates.push(date);
                    acc += u32::from(win);
                    wins.push(acc);
                }
                (name.to_string(), PlayerTimeline { dates, wins })
            })
            .collect();

        Self {
            window: window.max(1),
            players,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Mean result over at most `window` matches strictly before `date`.
    pub fn winrate_before(&self, player: &str, date: NaiveDate) -> f64 {
        let Some(timeline) = self.players.get(player) else {
            return NEUTRAL_WINRATE;
        };
        let end = timeline.dates.partition_point(|d| *d < date);
        let start = end.saturating_sub(self.window);
        if end == start {
            return NEUTRAL_WINRATE;
        }
        let wins = timeline.wins[end] - timeline.wins[start];
        f64::from(wins) / (end - start) as f64
    }
}
