use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use atp_matchup::classifier::LogisticModel;
use atp_matchup::corpus::{Corpus, load_corpus_dir};
use atp_matchup::features::assemble_feature_table;
use atp_matchup::form::RecentFormIndex;
use atp_matchup::h2h::HeadToHeadIndex;
use atp_matchup::{AnalyticsError, Engine};

const HEADER: &str = "tourney_id,tourney_name,surface,draw_size,tourney_date,winner_name,winner_hand,winner_ht,winner_age,loser_name,loser_hand,loser_ht,loser_age,score,winner_rank,winner_rank_points,loser_rank,loser_rank_points";

fn row(date: &str, winner: &str, loser: &str) -> String {
    let (w_rank, w_pts, w_hand) = attrs(winner);
    let (l_rank, l_pts, l_hand) = attrs(loser);
    format!(
        "x,Test Open,Hard,32,{date},{winner},{w_hand},185,27.5,{loser},{l_hand},188,24.1,6-4 6-4,{w_rank},{w_pts},{l_rank},{l_pts}"
    )
}

fn attrs(player: &str) -> (u32, u32, &'static str) {
    match player {
        "A" => (3, 7000, "R"),
        "B" => (12, 2500, "L"),
        "C" => (20, 1800, "R"),
        "D" => (45, 900, "R"),
        _ => (80, 600, "L"),
    }
}

fn write_season(dir: &Path, name: &str, rows: &[String]) {
    let mut body = String::from(HEADER);
    for r in rows {
        body.push('\n');
        body.push_str(r);
    }
    body.push('\n');
    fs::write(dir.join(name), body).unwrap();
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y%m%d").unwrap()
}

fn scenario_rows() -> Vec<String> {
    vec![
        row("20230101", "A", "B"),
        row("20230105", "C", "D"),
        row("20230110", "E", "C"),
        row("20230115", "C", "D"),
        row("20230120", "C", "E"),
        row("20230201", "A", "B"),
        row("20230301", "B", "A"),
    ]
}

fn load_scenario() -> Corpus {
    let dir = tempfile::tempdir().unwrap();
    write_season(dir.path(), "atp_matches_2023.csv", &scenario_rows());
    fs::write(dir.path().join("README.txt"), "not a season file").unwrap();
    let (corpus, summary) = load_corpus_dir(dir.path()).unwrap();
    assert_eq!(summary.files.len(), 1);
    assert_eq!(summary.rows_kept, 7);
    corpus
}

#[test]
fn two_prior_wins_give_full_h2h() {
    let corpus = load_scenario();
    let h2h = HeadToHeadIndex::build(corpus.matches());
    let as_of = day("20230301");
    assert_eq!(h2h.winrate_before("A", "B", as_of), 1.0);
    assert_eq!(h2h.winrate_before("B", "A", as_of), 0.0);
    // The same-day meeting only shows up in the whole-history rate.
    assert!((h2h.winrate("A", "B") - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(h2h.winrate("A", "E"), 0.5);
    assert_eq!(h2h.winrate("E", "A"), 0.5);
}

#[test]
fn win_loss_win_win_gives_three_quarters() {
    let corpus = load_scenario();
    let form = RecentFormIndex::build(corpus.matches(), 5);
    assert_eq!(form.winrate_before("C", day("20230301")), 0.75);
    assert_eq!(form.winrate_before("C", day("20230105")), 0.5);
}

#[test]
fn feature_rows_only_see_the_past() {
    let corpus = load_scenario();
    let table = assemble_feature_table(&corpus, 5);
    assert_eq!(table.rows.len(), 7);

    let last = table.rows.last().unwrap();
    assert_eq!(last.record.winner.name, "B");
    assert_eq!(last.h2h_winrate, 0.0);
    assert_eq!(last.features.h2h_winrate, 0.0);
    assert_eq!(last.features.hand_matchup.label(), "L_R");
    assert!(!last.features.same_hand);
}

#[test]
fn later_matches_do_not_leak_into_earlier_features() {
    let corpus = load_scenario();
    let cutoff = day("20230201");
    let truncated = Corpus::from_records(
        corpus
            .matches()
            .iter()
            .filter(|m| m.date < cutoff)
            .cloned()
            .collect(),
    );

    let full = assemble_feature_table(&corpus, 5);
    let early = assemble_feature_table(&truncated, 5);
    let full_early = full
        .rows
        .iter()
        .filter(|r| r.record.date < cutoff)
        .collect::<Vec<_>>();
    assert_eq!(full_early.len(), early.rows.len());
    for (a, b) in full_early.iter().zip(&early.rows) {
        assert_eq!(a.features, b.features);
    }

    let full_h2h = HeadToHeadIndex::build(corpus.matches());
    let early_h2h = HeadToHeadIndex::build(truncated.matches());
    assert_eq!(
        full_h2h.winrate_before("A", "B", cutoff),
        early_h2h.winrate_before("A", "B", cutoff)
    );
}

#[test]
fn each_row_is_unchanged_when_only_its_past_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = scenario_rows();
    // A second meeting on the day B beat A.
    rows.push(row("20230301", "A", "B"));
    rows.push(row("20230310", "C", "A"));
    write_season(dir.path(), "atp_matches_2023.csv", &rows);
    let (corpus, _) = load_corpus_dir(dir.path()).unwrap();
    let full = assemble_feature_table(&corpus, 5);
    assert_eq!(full.rows.len(), 9);

    for (idx, m) in corpus.matches().iter().enumerate() {
        // Everything on or after this match's day goes, except the match itself.
        let mut kept = corpus
            .matches()
            .iter()
            .filter(|other| other.date < m.date)
            .cloned()
            .collect::<Vec<_>>();
        kept.push(m.clone());
        let truncated = assemble_feature_table(&Corpus::from_records(kept), 5);

        let expected = full.rows.iter().find(|r| r.seq == idx).unwrap();
        let actual = truncated.rows.last().unwrap();
        assert_eq!(actual.record, expected.record);
        assert_eq!(actual.features, expected.features, "row {idx}");
        assert_eq!(actual.winner_recent_winrate, expected.winner_recent_winrate);
        assert_eq!(actual.loser_recent_winrate, expected.loser_recent_winrate);
    }

    // Both 2023-03-01 meetings only see the two January/February A wins.
    let same_day = full
        .rows
        .iter()
        .filter(|r| r.record.date == day("20230301"))
        .collect::<Vec<_>>();
    assert_eq!(same_day.len(), 2);
    for r in same_day {
        let expected = if r.record.winner.name == "A" { 1.0 } else { 0.0 };
        assert_eq!(r.h2h_winrate, expected);
    }
}

#[test]
fn engine_as_of_queries_match_stored_rows() {
    let engine = Engine::from_corpus(load_scenario(), 5, Box::new(LogisticModel::neutral()));
    for r in engine.feature_rows() {
        let (w, l, date) = (&r.record.winner.name, &r.record.loser.name, r.record.date);
        assert_eq!(engine.h2h_winrate_as_of(w, l, date), r.h2h_winrate);
        assert_eq!(engine.recent_winrate_as_of(w, date), r.winner_recent_winrate);
        assert_eq!(engine.recent_winrate_as_of(l, date), r.loser_recent_winrate);
    }
    // Later matches are invisible to an earlier as-of date.
    assert_eq!(engine.h2h_winrate_as_of("A", "B", day("20230101")), 0.5);
    assert_eq!(engine.recent_winrate_as_of("C", day("20230115")), 0.5);
    assert_eq!(engine.recent_winrate_as_of("C", day("20230116")), 2.0 / 3.0);
}

#[test]
fn removing_an_earlier_match_changes_the_as_of_value() {
    let corpus = load_scenario();
    let without_loss = Corpus::from_records(
        corpus
            .matches()
            .iter()
            .filter(|m| !(m.winner.name == "E" && m.loser.name == "C"))
            .cloned()
            .collect(),
    );
    let before = RecentFormIndex::build(corpus.matches(), 5);
    let after = RecentFormIndex::build(without_loss.matches(), 5);
    let as_of = day("20230301");
    assert_eq!(before.winrate_before("C", as_of), 0.75);
    assert_eq!(after.winrate_before("C", as_of), 1.0);
}

#[test]
fn unknown_player_prediction_is_an_error() {
    let engine = Engine::from_corpus(load_scenario(), 5, Box::new(LogisticModel::neutral()));
    let err = engine
        .predict_win_probability("Unknown Player", "A")
        .unwrap_err();
    assert_eq!(
        err,
        AnalyticsError::PlayerNotFound {
            name: "Unknown Player".to_string()
        }
    );
    assert!(engine.get_player_stats("Unknown Player").is_err());
}

#[test]
fn engine_serves_snapshots_and_probabilities() {
    let mut model = LogisticModel::neutral();
    model.coeffs[0] = 0.9;
    model.feature_stds[0] = 20.0;
    model.intercept = 0.3;
    let engine = Engine::from_corpus(load_scenario(), 5, Box::new(model));

    let a = engine.get_player_stats("A").unwrap();
    assert_eq!(a.as_of, day("20230301"));
    assert_eq!(a.rank, 3.0);
    // A's pre-match form on the day of the loss: two prior wins.
    assert_eq!(a.recent_winrate, 1.0);

    let p = engine.predict_win_probability("A", "E").unwrap();
    let q = engine.predict_win_probability("E", "A").unwrap();
    assert_eq!(p.prob_a, q.prob_b);
    assert!((p.prob_a + p.prob_b - 1.0).abs() < 1e-12);
    assert!(p.prob_a > 0.5);
    // The intercept favours whoever is scored as subject; averaging removes it.
    assert!(p.raw_a > p.prob_a);

    assert_eq!(engine.calculate_h2h_winrate("C", "D"), 1.0);
    assert_eq!(engine.h2h_record("A", "B"), (2, 1));
    assert_eq!(engine.recent_h2h("B", "A", 5)[0].winner.name, "B");
    assert_eq!(engine.career_summary("C").unwrap().wins, 3);
}
