use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::classifier::Classifier;
use crate::corpus::{Hand, MatchRecord};
use crate::error::AnalyticsError;
use crate::features::{FeatureRow, FeatureVector, PlayerAttrs, directional_features};
use crate::h2h::HeadToHeadIndex;

/// A player's latest known state in the feature table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerSnapshot {
    pub name: String,
    pub as_of: NaiveDate,
    pub rank: f64,
    pub rank_points: f64,
    pub age: f64,
    pub height: f64,
    pub hand: Hand,
    pub recent_winrate: f64,
    #[serde(skip)]
    seq: usize,
}

impl PlayerSnapshot {
    pub fn attrs(&self) -> PlayerAttrs {
        PlayerAttrs {
            rank: self.rank,
            rank_points: self.rank_points,
            age: self.age,
            height: self.height,
            hand: self.hand,
        }
    }
}

/// Latest snapshot per player. On equal dates the row later in corpus order wins.
#[derive(Debug, Clone, Default)]
pub struct PlayerDirectory {
    players: HashMap<String, PlayerSnapshot>,
    // names seen in the corpus without any complete row
    unresolved: HashSet<String>,
}

impl PlayerDirectory {
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        let mut players: HashMap<String, PlayerSnapshot> = HashMap::new();
        for row in rows {
            let sides = [
                (&row.record.winner.name, row.winner_attrs(), row.winner_recent_winrate),
                (&row.record.loser.name, row.loser_attrs(), row.loser_recent_winrate),
            ];
            for (name, attrs, recent) in sides {
                let Some(attrs) = attrs else {
                    continue;
                };
                let newer = players
                    .get(name.as_str())
                    .is_none_or(|cur| (row.record.date, row.seq) >= (cur.as_of, cur.seq));
                if newer {
                    players.insert(
                        name.clone(),
                        PlayerSnapshot {
                            name: name.clone(),
                            as_of: row.record.date,
                            rank: attrs.rank,
                            rank_points: attrs.rank_points,
                            age: attrs.age,
                            height: attrs.height,
                            hand: attrs.hand,
                            recent_winrate: recent,
                            seq: row.seq,
                        },
                    );
                }
            }
        }
        Self {
            players,
            unresolved: HashSet::new(),
        }
    }

    /// Remembers every other player in `matches` so lookups can tell an unknown
    /// name from one that only has incomplete rows.
    pub fn with_history<'a, I>(mut self, matches: I) -> Self
    where
        I: IntoIterator<Item = &'a MatchRecord>,
    {
        for m in matches {
            for name in [&m.winner.name, &m.loser.name] {
                if !self.players.contains_key(name.as_str()) {
                    self.unresolved.insert(name.clone());
                }
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<&PlayerSnapshot, AnalyticsError> {
        match self.players.get(name) {
            Some(snapshot) => Ok(snapshot),
            None if self.unresolved.contains(name) => Err(AnalyticsError::NoResolvableStats {
                name: name.to_string(),
            }),
            None => Err(AnalyticsError::player_not_found(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.players.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchupPrediction {
    /// Symmetric probability that the first-named player wins.
    pub prob_a: f64,
    pub prob_b: f64,
    /// Directional score of `F(a, b)`.
    pub raw_a: f64,
    /// Directional score of `F(b, a)`.
    pub raw_b: f64,
}

/// Turns a directional classifier into an order-invariant probability pair.
pub struct SymmetricPredictor<'a> {
    directory: &'a PlayerDirectory,
    h2h: &'a HeadToHeadIndex,
    model: &'a dyn Classifier,
}

impl<'a> SymmetricPredictor<'a> {
    pub fn new(
        directory: &'a PlayerDirectory,
        h2h: &'a HeadToHeadIndex,
        model: &'a dyn Classifier,
    ) -> Self {
        Self {
            directory,
            h2h,
            model,
        }
    }

    /// `F(subject, opponent)` from current snapshots and the whole meeting history.
    pub fn features_for(
        &self,
        subject: &str,
        opponent: &str,
    ) -> Result<FeatureVector, AnalyticsError> {
        let s = self.directory.get(subject)?;
        let o = self.directory.get(opponent)?;
        Ok(directional_features(
            &s.attrs(),
            &o.attrs(),
            self.h2h.winrate(subject, opponent),
            s.recent_winrate,
            o.recent_winrate,
        ))
    }

    /// Scores both directions and averages the forward score with the complement
    /// of the reverse one. Both results are always derived from the name-ordered
    /// pair, so `predict(a, b)` is exactly `predict(b, a)` swapped.
    pub fn predict(&self, a: &str, b: &str) -> Result<MatchupPrediction, AnalyticsError> {
        self.directory.get(a)?;
        self.directory.get(b)?;

        let swapped = a > b;
        let (first, second) = if swapped { (b, a) } else { (a, b) };

        let raw_first = self.checked_score(&self.features_for(first, second)?)?;
        let raw_second = self.checked_score(&self.features_for(second, first)?)?;

        let p_first = (raw_first + (1.0 - raw_second)) / 2.0;
        let p_second = 1.0 - p_first;

        Ok(if swapped {
            MatchupPrediction {
                prob_a: p_second,
                prob_b: p_first,
                raw_a: raw_second,
                raw_b: raw_first,
            }
        } else {
            MatchupPrediction {
                prob_a: p_first,
                prob_b: p_second,
                raw_a: raw_first,
                raw_b: raw_second,
            }
        })
    }

    fn checked_score(&self, features: &FeatureVector) -> Result<f64, AnalyticsError> {
        let p = self.model.score(features)?;
        if !(0.0..=1.0).contains(&p) {
            return Err(AnalyticsError::MalformedModel(format!(
                "{} returned probability {p}",
                self.model.name()
            )));
        }
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::corpus::{Corpus, MatchRecord, PlayerLine};
    use crate::features::assemble_feature_table;

    /// Deliberately asymmetric: favours whoever is passed as subject.
    struct SubjectBiased;

    impl Classifier for SubjectBiased {
        fn name(&self) -> &str {
            "subject-biased"
        }

        fn score(&self, f: &FeatureVector) -> Result<f64, AnalyticsError> {
            f.validate()?;
            Ok((0.6 + f.ranking_diff / 1000.0).clamp(0.0, 1.0))
        }
    }

    fn line(name: &str, rank: f64, age: f64) -> PlayerLine {
        PlayerLine {
            name: name.to_string(),
            rank: Some(rank),
            rank_points: Some(10000.0 / rank),
            age: Some(age),
            height: Some(185.0),
            hand: Some(Hand::Right),
        }
    }

    fn record(d: u32, winner: PlayerLine, loser: PlayerLine) -> MatchRecord {
        MatchRecord {
            date: NaiveDate::from_ymd_opt(2024, 5, d).unwrap(),
            tournament: "Rome".to_string(),
            surface: Some("Clay".to_string()),
            winner,
            loser,
            score: None,
        }
    }

    fn fixture() -> Vec<FeatureRow> {
        let corpus = Corpus::from_records(vec![
            record(1, line("Alpha", 4.0, 22.0), line("Beta", 30.0, 31.0)),
            record(3, line("Beta", 25.0, 31.0), line("Gamma", 60.0, 27.0)),
            record(3, line("Gamma", 55.0, 27.1), line("Alpha", 5.0, 22.1)),
        ]);
        assemble_feature_table(&corpus, 5).rows
    }

    #[test]
    fn snapshot_uses_latest_row_and_later_row_on_ties() {
        let rows = fixture();
        let dir = PlayerDirectory::from_rows(&rows);
        let beta = dir.get("Beta").unwrap();
        assert_eq!(beta.rank, 25.0);
        let gamma = dir.get("Gamma").unwrap();
        // Both Gamma rows are on day 3; the later one in corpus order wins.
        assert_eq!(gamma.rank, 55.0);
        assert_eq!(gamma.recent_winrate, 0.5);
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn averaging_cancels_subject_bias() {
        let rows = fixture();
        let dir = PlayerDirectory::from_rows(&rows);
        let h2h = HeadToHeadIndex::build(rows.iter().map(|r| &r.record));
        let model = SubjectBiased;
        let predictor = SymmetricPredictor::new(&dir, &h2h, &model);

        let p = predictor.predict("Alpha", "Alpha").unwrap();
        assert!((p.prob_a - 0.5).abs() < 1e-12);
        assert!(p.raw_a > 0.5);

        let ab = predictor.predict("Alpha", "Gamma").unwrap();
        let ba = predictor.predict("Gamma", "Alpha").unwrap();
        assert_eq!(ab.prob_a, ba.prob_b);
        assert_eq!(ab.prob_b, ba.prob_a);
        assert_eq!(ab.raw_a, ba.raw_b);
        assert!((ab.prob_a + ab.prob_b - 1.0).abs() < 1e-12);
        // raw_a alone would overstate Alpha by the subject bias.
        assert!(ab.raw_a > ab.prob_a);
    }

    #[test]
    fn unknown_player_is_an_error() {
        let rows = fixture();
        let dir = PlayerDirectory::from_rows(&rows);
        let h2h = HeadToHeadIndex::build(rows.iter().map(|r| &r.record));
        let model = SubjectBiased;
        let predictor = SymmetricPredictor::new(&dir, &h2h, &model);
        assert_eq!(
            predictor.predict("Unknown Player", "Alpha").unwrap_err(),
            AnalyticsError::player_not_found("Unknown Player")
        );
        assert!(predictor.predict("Alpha", "Unknown Player").is_err());
    }

    #[test]
    fn features_for_orients_h2h() {
        let rows = fixture();
        let dir = PlayerDirectory::from_rows(&rows);
        let h2h = HeadToHeadIndex::build(rows.iter().map(|r| &r.record));
        let model = SubjectBiased;
        let predictor = SymmetricPredictor::new(&dir, &h2h, &model);
        let f = predictor.features_for("Alpha", "Beta").unwrap();
        let r = predictor.features_for("Beta", "Alpha").unwrap();
        assert_eq!(f.h2h_winrate, 1.0);
        assert_eq!(r.h2h_winrate, 0.0);
        assert_eq!(f.flipped(), r);
    }
}
