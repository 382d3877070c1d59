use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::corpus::{Corpus, Hand, MatchRecord, PlayerLine};
use crate::error::AnalyticsError;
use crate::form::RecentFormIndex;
use crate::h2h::HeadToHeadIndex;

/// Column order the classifier is trained and scored on.
pub const FEATURE_NAMES: [&str; 8] = [
    "ranking_diff",
    "rank_points_diff",
    "age_diff",
    "height_diff",
    "same_hand",
    "hand_matchup",
    "h2h_winrate",
    "recent_winrate_diff",
];

/// `FEATURE_NAMES` without the categorical column, in the order of [`FeatureVector::numeric`].
pub const NUMERIC_FEATURE_NAMES: [&str; 7] = [
    "ranking_diff",
    "rank_points_diff",
    "age_diff",
    "height_diff",
    "same_hand",
    "h2h_winrate",
    "recent_winrate_diff",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandMatchup {
    pub subject: Hand,
    pub opponent: Hand,
}

impl HandMatchup {
    pub fn new(subject: Hand, opponent: Hand) -> Self {
        Self { subject, opponent }
    }

    pub fn swapped(self) -> Self {
        Self {
            subject: self.opponent,
            opponent: self.subject,
        }
    }

    /// Category label as stored in the feature table, e.g. `R_L`.
    pub fn label(self) -> String {
        self.to_string()
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (subject, opponent) = raw.trim().split_once('_')?;
        Some(Self {
            subject: Hand::parse(subject)?,
            opponent: Hand::parse(opponent)?,
        })
    }
}

impl fmt::Display for HandMatchup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.subject, self.opponent)
    }
}

/// Match-up seen from the subject's side against one opponent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ranking_diff: f64,
    pub rank_points_diff: f64,
    pub age_diff: f64,
    pub height_diff: f64,
    pub same_hand: bool,
    pub hand_matchup: HandMatchup,
    pub h2h_winrate: f64,
    pub recent_winrate_diff: f64,
}

impl FeatureVector {
    pub fn numeric(&self) -> [f64; 7] {
        [
            self.ranking_diff,
            self.rank_points_diff,
            self.age_diff,
            self.height_diff,
            if self.same_hand { 1.0 } else { 0.0 },
            self.h2h_winrate,
            self.recent_winrate_diff,
        ]
    }

    /// Rejects non-finite values and win rates outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        for (name, value) in NUMERIC_FEATURE_NAMES.into_iter().zip(self.numeric()) {
            if !value.is_finite() {
                return Err(AnalyticsError::InvalidFeature {
                    feature: name,
                    value,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.h2h_winrate) {
            return Err(AnalyticsError::InvalidFeature {
                feature: "h2h_winrate",
                value: self.h2h_winrate,
            });
        }
        Ok(())
    }

    /// The same match-up seen from the opponent's side.
    pub fn flipped(&self) -> Self {
        Self {
            ranking_diff: -self.ranking_diff,
            rank_points_diff: -self.rank_points_diff,
            age_diff: -self.age_diff,
            height_diff: -self.height_diff,
            same_hand: self.same_hand,
            hand_matchup: self.hand_matchup.swapped(),
            h2h_winrate: 1.0 - self.h2h_winrate,
            recent_winrate_diff: -self.recent_winrate_diff,
        }
    }
}

/// A player's attributes with every field the features need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerAttrs {
    pub rank: f64,
    pub rank_points: f64,
    pub age: f64,
    pub height: f64,
    pub hand: Hand,
}

impl PlayerAttrs {
    /// `None` when a required field is missing or not finite.
    pub fn from_line(line: &PlayerLine) -> Option<Self> {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Some(Self {
            rank: finite(line.rank)?,
            rank_points: finite(line.rank_points)?,
            age: finite(line.age)?,
            height: finite(line.height)?,
            hand: line.hand?,
        })
    }
}

/// `h2h_winrate` must already be oriented to `subject`.
pub fn directional_features(
    subject: &PlayerAttrs,
    opponent: &PlayerAttrs,
    h2h_winrate: f64,
    subject_recent: f64,
    opponent_recent: f64,
) -> FeatureVector {
    FeatureVector {
        ranking_diff: opponent.rank - subject.rank,
        rank_points_diff: subject.rank_points - opponent.rank_points,
        age_diff: subject.age - opponent.age,
        height_diff: subject.height - opponent.height,
        same_hand: subject.hand == opponent.hand,
        hand_matchup: HandMatchup::new(subject.hand, opponent.hand),
        h2h_winrate,
        recent_winrate_diff: subject_recent - opponent_recent,
    }
}

/// One historical match with its pre-match features, from the winner's side.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Position of the match in the time-ordered corpus.
    pub seq: usize,
    pub record: MatchRecord,
    pub winner_recent_winrate: f64,
    pub loser_recent_winrate: f64,
    pub h2h_winrate: f64,
    pub features: FeatureVector,
}

impl FeatureRow {
    pub fn winner_attrs(&self) -> Option<PlayerAttrs> {
        PlayerAttrs::from_line(&self.record.winner)
    }

    pub fn loser_attrs(&self) -> Option<PlayerAttrs> {
        PlayerAttrs::from_line(&self.record.loser)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
    pub dropped_incomplete: usize,
}

/// Both players carry every attribute the features need.
pub fn is_complete(m: &MatchRecord) -> bool {
    PlayerAttrs::from_line(&m.winner).is_some() && PlayerAttrs::from_line(&m.loser).is_some()
}

/// Matches that survive the completeness filter, in corpus order.
pub fn complete_matches(corpus: &Corpus) -> impl Iterator<Item = &MatchRecord> {
    corpus.matches().iter().filter(|m| is_complete(m))
}

/// Drops incomplete rows, builds the history indexes over the rest and
/// assembles the table.
pub fn assemble_feature_table(corpus: &Corpus, form_window: usize) -> FeatureTable {
    let h2h = HeadToHeadIndex::build(complete_matches(corpus));
    let form = RecentFormIndex::build(complete_matches(corpus), form_window);
    assemble_with(corpus, &h2h, &form)
}

/// The indexes must have been built from [`complete_matches`] for the rows to
/// match a fresh [`assemble_feature_table`].
pub fn assemble_with(
    corpus: &Corpus,
    h2h: &HeadToHeadIndex,
    form: &RecentFormIndex,
) -> FeatureTable {
    let mut table = FeatureTable::default();
    for (seq, m) in corpus.matches().iter().enumerate() {
        let (Some(winner), Some(loser)) = (
            PlayerAttrs::from_line(&m.winner),
            PlayerAttrs::from_line(&m.loser),
        ) else {
            table.dropped_incomplete += 1;
            continue;
        };

        let h2h_winrate = h2h.winrate_before(&m.winner.name, &m.loser.name, m.date);
        let winner_recent = form.winrate_before(&m.winner.name, m.date);
        let loser_recent = form.winrate_before(&m.loser.name, m.date);

        table.rows.push(FeatureRow {
            seq,
            record: m.clone(),
            winner_recent_winrate: winner_recent,
            loser_recent_winrate: loser_recent,
            h2h_winrate,
            features: directional_features(
                &winner,
                &loser,
                h2h_winrate,
                winner_recent,
                loser_recent,
            ),
        });
    }

    info!(
        rows = table.rows.len(),
        dropped_incomplete = table.dropped_incomplete,
        pairs = h2h.pair_count(),
        meetings = h2h.meeting_count(),
        players = form.player_count(),
        "feature table assembled"
    );
    table
}
