use std::fs;

use chrono::NaiveDate;

use atp_matchup::{AnalyticsError, Engine};
use atp_matchup::classifier::{LogisticModel, save_model};
use atp_matchup::config::AppConfig;
use atp_matchup::corpus::{Corpus, Hand, MatchRecord, PlayerLine};
use atp_matchup::features::assemble_feature_table;
use atp_matchup::store;

fn line(name: &str, rank: f64, hand: Hand) -> PlayerLine {
    PlayerLine {
        name: name.to_string(),
        rank: Some(rank),
        rank_points: Some(9000.0 / rank),
        age: Some(24.0),
        height: Some(183.0),
        hand: Some(hand),
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
}

fn corpus() -> Corpus {
    let rec = |d: u32, winner: PlayerLine, loser: PlayerLine| MatchRecord {
        date: day(d),
        tournament: "Shanghai".to_string(),
        surface: Some("Hard".to_string()),
        winner,
        loser,
        score: Some("7-6 6-3".to_string()),
    };
    let mut no_height = line("Shelton", 14.0, Hand::Left);
    no_height.height = None;
    Corpus::from_records(vec![
        rec(2, line("Sinner", 1.0, Hand::Right), line("Shelton", 15.0, Hand::Left)),
        rec(5, line("Djokovic", 4.0, Hand::Right), no_height),
        rec(9, line("Sinner", 1.0, Hand::Right), line("Djokovic", 4.0, Hand::Right)),
    ])
}

fn config(dir: &std::path::Path) -> AppConfig {
    AppConfig {
        data_dir: dir.join("data"),
        db_path: dir.join("store").join("features.sqlite"),
        model_path: dir.join("model").join("match_model.json"),
        form_window: 5,
    }
}

#[test]
fn engine_opens_from_store_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());

    let corpus = corpus();
    let table = assemble_feature_table(&corpus, cfg.form_window);
    let mut conn = store::open_db(&cfg.db_path).unwrap();
    store::replace_all(&mut conn, &corpus, &table, 1, 3, cfg.form_window).unwrap();
    drop(conn);

    let mut model = LogisticModel::neutral();
    model.coeffs[0] = 0.5;
    save_model(&cfg.model_path, &model).unwrap();

    let engine = Engine::open(&cfg).unwrap();
    assert_eq!(engine.corpus().len(), 3);
    assert_eq!(engine.feature_rows().len(), 2);

    // Shelton's only complete row is the first one.
    let shelton = engine.get_player_stats("Shelton").unwrap();
    assert_eq!(shelton.rank, 15.0);
    // The incomplete match is in the corpus but in nobody's history.
    assert_eq!(engine.career_summary("Djokovic").unwrap().wins, 1);
    assert_eq!(engine.h2h_record("Djokovic", "Shelton"), (0, 0));
    assert_eq!(engine.recent_winrate_as_of("Djokovic", day(9)), 0.5);

    let p = engine.predict_win_probability("Sinner", "Djokovic").unwrap();
    assert!(p.prob_a > 0.5);
    assert!((p.prob_a + p.prob_b - 1.0).abs() < 1e-12);
}

#[test]
fn missing_artifact_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let corpus = corpus();
    let table = assemble_feature_table(&corpus, 5);
    let mut conn = store::open_db(&cfg.db_path).unwrap();
    store::replace_all(&mut conn, &corpus, &table, 1, 3, 5).unwrap();
    drop(conn);

    assert!(Engine::open(&cfg).is_err());
}

#[test]
fn schema_mismatch_in_artifact_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let corpus = corpus();
    let table = assemble_feature_table(&corpus, 5);
    let mut conn = store::open_db(&cfg.db_path).unwrap();
    store::replace_all(&mut conn, &corpus, &table, 1, 3, 5).unwrap();
    drop(conn);

    let mut model = LogisticModel::neutral();
    model.feature_names.reverse();
    fs::create_dir_all(cfg.model_path.parent().unwrap()).unwrap();
    fs::write(&cfg.model_path, serde_json::to_string(&model).unwrap()).unwrap();

    let err = Engine::open(&cfg).err().unwrap();
    assert!(format!("{err:#}").contains("schema mismatch"));
}

#[test]
fn empty_store_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    assert!(Engine::open(&cfg).is_err());
}

#[test]
fn stored_form_window_overrides_configured_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());

    let rec = |d: u32, winner: &str, loser: &str| MatchRecord {
        date: day(d),
        tournament: "Paris".to_string(),
        surface: Some("Hard".to_string()),
        winner: line(winner, 10.0, Hand::Right),
        loser: line(loser, 20.0, Hand::Right),
        score: None,
    };
    // X: W W W W L L, then a match on day 9.
    let corpus = Corpus::from_records(vec![
        rec(1, "X", "P1"),
        rec(2, "X", "P2"),
        rec(3, "X", "P3"),
        rec(4, "X", "P4"),
        rec(5, "P5", "X"),
        rec(6, "P6", "X"),
        rec(9, "X", "P7"),
    ]);
    let table = assemble_feature_table(&corpus, 5);
    let mut conn = store::open_db(&cfg.db_path).unwrap();
    store::replace_all(&mut conn, &corpus, &table, 1, 7, 5).unwrap();
    drop(conn);
    save_model(&cfg.model_path, &LogisticModel::neutral()).unwrap();

    cfg.form_window = 2;
    let engine = Engine::open(&cfg).unwrap();
    assert_eq!(engine.form_window(), 5);

    let x = engine.get_player_stats("X").unwrap();
    assert_eq!(x.as_of, day(9));
    assert!((x.recent_winrate - 0.6).abs() < 1e-12);
    assert_eq!(engine.recent_winrate_as_of("X", day(9)), x.recent_winrate);
}

#[test]
fn player_with_only_incomplete_rows_has_no_resolvable_stats() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());

    let mut unranked = line("Qualifier", 1.0, Hand::Right);
    unranked.rank = None;
    let mut records = corpus().matches().to_vec();
    records.push(MatchRecord {
        date: day(12),
        tournament: "Shanghai".to_string(),
        surface: Some("Hard".to_string()),
        winner: line("Sinner", 1.0, Hand::Right),
        loser: unranked,
        score: None,
    });
    let corpus = Corpus::from_records(records);
    let table = assemble_feature_table(&corpus, 5);
    let mut conn = store::open_db(&cfg.db_path).unwrap();
    store::replace_all(&mut conn, &corpus, &table, 1, 4, 5).unwrap();
    drop(conn);
    save_model(&cfg.model_path, &LogisticModel::neutral()).unwrap();

    let engine = Engine::open(&cfg).unwrap();
    assert_eq!(
        engine.predict_win_probability("Sinner", "Qualifier").unwrap_err(),
        AnalyticsError::NoResolvableStats {
            name: "Qualifier".to_string()
        }
    );
}
