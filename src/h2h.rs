use std::collections::HashMap;

use chrono::NaiveDate;

use crate::corpus::MatchRecord;

/// Win rate assumed when there is no qualifying history.
pub const NEUTRAL_WINRATE: f64 = 0.5;

/// Lexicographically ordered pair of player names. `first < second` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    first: String,
    second: String,
}

impl PairKey {
    /// `None` when both names are the same player.
    pub fn new(a: &str, b: &str) -> Option<Self> {
        let (first, second) = canonical(a, b)?;
        Some(Self {
            first: first.to_string(),
            second: second.to_string(),
        })
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }
}

fn canonical<'a>(a: &'a str, b: &'a str) -> Option<(&'a str, &'a str)> {
    match a.cmp(b) {
        std::cmp::Ordering::Less => Some((a, b)),
        std::cmp::Ordering::Greater => Some((b, a)),
        std::cmp::Ordering::Equal => None,
    }
}

#[derive(Debug, Clone, Default)]
struct PairHistory {
    dates: Vec<NaiveDate>,
    // first_wins[i] = wins of the pair's first player over the first i meetings
    first_wins: Vec<u32>,
}

impl PairHistory {
    fn from_meetings(mut meetings: Vec<(NaiveDate, bool)>) -> Self {
        meetings.sort_by_key(|(date, _)| *date);
        let mut dates = Vec::with_capacity(meetings.len());
        let mut first_wins = Vec::with_capacity(meetings.len() + 1);
        first_wins.push(0);
        let mut acc = 0u32;
        for (date, first_won) in meetings {
            dates.push(date);
            if first_won {
                acc += 1;
            }
            first_wins.push(acc);
        }
        Self { dates, first_wins }
    }

    fn prior_count(&self, before: Option<NaiveDate>) -> usize {
        match before {
            Some(date) => self.dates.partition_point(|d| *d < date),
            None => self.dates.len(),
        }
    }

    fn first_record(&self, before: Option<NaiveDate>) -> (u32, u32) {
        let n = self.prior_count(before);
        let wins = self.first_wins[n];
        (wins, n as u32 - wins)
    }
}

/// Pairwise meeting history, queried leakage-free by date.
#[derive(Debug, Clone, Default)]
pub struct HeadToHeadIndex {
    by_first: HashMap<String, HashMap<String, PairHistory>>,
    meetings: usize,
}

impl HeadToHeadIndex {
    pub fn build<'a, I>(matches: I) -> Self
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        let mut grouped: HashMap<PairKey, Vec<(NaiveDate, bool)>> = HashMap::new();
        let mut meetings = 0usize;
        for m in matches {
            let Some(key) = PairKey::new(&m.winner.name, &m.loser.name) else {
                continue;
            };
            let first_won = m.winner.name == key.first;
            grouped.entry(key).or_default().push((m.date, first_won));
            meetings += 1;
        }

        let mut by_first: HashMap<String, HashMap<String, PairHistory>> = HashMap::new();
        for (key, rows) in grouped {
            by_first
                .entry(key.first)
                .or_default()
                .insert(key.second, PairHistory::from_meetings(rows));
        }
        Self { by_first, meetings }
    }

    pub fn pair_count(&self) -> usize {
        self.by_first.values().map(HashMap::len).sum()
    }

    pub fn meeting_count(&self) -> usize {
        self.meetings
    }

    /// Subject's win rate against `opponent` over meetings strictly before `date`.
    pub fn winrate_before(&self, subject: &str, opponent: &str, date: NaiveDate) -> f64 {
        self.oriented_winrate(subject, opponent, Some(date))
    }

    /// Subject's win rate against `opponent` over every recorded meeting.
    pub fn winrate(&self, subject: &str, opponent: &str) -> f64 {
        self.oriented_winrate(subject, opponent, None)
    }

    /// `(subject_wins, opponent_wins)` over every recorded meeting.
    pub fn record(&self, subject: &str, opponent: &str) -> (u32, u32) {
        let Some((first, history)) = self.history(subject, opponent) else {
            return (0, 0);
        };
        let (first_wins, first_losses) = history.first_record(None);
        if subject == first {
            (first_wins, first_losses)
        } else {
            (first_losses, first_wins)
        }
    }

    fn oriented_winrate(&self, subject: &str, opponent: &str, before: Option<NaiveDate>) -> f64 {
        let Some((first, history)) = self.history(subject, opponent) else {
            return NEUTRAL_WINRATE;
        };
        let (wins, losses) = history.first_record(before);
        let n = wins + losses;
        if n == 0 {
            return NEUTRAL_WINRATE;
        }
        let first_rate = f64::from(wins) / f64::from(n);
        if subject == first {
            first_rate
        } else {
            1.0 - first_rate
        }
    }

    fn history<'a>(&self, a: &'a str, b: &'a str) -> Option<(&'a str, &PairHistory)> {
        let (first, second) = canonical(a, b)?;
        let history = self.by_first.get(first)?.get(second)?;
        Some((first, history))
    }
}
