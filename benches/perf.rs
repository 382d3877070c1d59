use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use atp_matchup::Engine;
use atp_matchup::classifier::LogisticModel;
use atp_matchup::corpus::{Corpus, Hand, LoadSummary, MatchRecord, PlayerLine, read_matches};
use atp_matchup::features::assemble_feature_table;
use atp_matchup::training::{TrainingConfig, train};

const PLAYERS: usize = 300;
const MATCHES: usize = 20_000;

fn sample_corpus(seed: u64) -> Corpus {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let records = (0..MATCHES)
        .map(|i| {
            let a = rng.gen_range(0..PLAYERS);
            let mut b = rng.gen_range(0..PLAYERS - 1);
            if b >= a {
                b += 1;
            }
            let upset = rng.gen_bool(0.3);
            let (better, worse) = if a < b { (a, b) } else { (b, a) };
            let (w, l) = if upset { (worse, better) } else { (better, worse) };
            MatchRecord {
                date: start + chrono::Days::new((i / 40) as u64),
                tournament: format!("Event {}", i / 200),
                surface: Some(["Hard", "Clay", "Grass"][i % 3].to_string()),
                winner: player(w),
                loser: player(l),
                score: None,
            }
        })
        .collect();
    Corpus::from_records(records)
}

fn player(idx: usize) -> PlayerLine {
    let rank = (idx + 1) as f64;
    PlayerLine {
        name: format!("Player {idx:03}"),
        rank: Some(rank),
        rank_points: Some(15_000.0 / rank),
        age: Some(19.0 + (idx % 17) as f64),
        height: Some(170.0 + (idx % 25) as f64),
        hand: Some(if idx % 6 == 0 { Hand::Left } else { Hand::Right }),
    }
}

fn bench_csv_read(c: &mut Criterion) {
    let mut csv = String::from(
        "tourney_name,surface,tourney_date,winner_name,winner_hand,winner_ht,winner_age,loser_name,loser_hand,loser_ht,loser_age,score,winner_rank,winner_rank_points,loser_rank,loser_rank_points\n",
    );
    for i in 0..2_000 {
        csv.push_str(&format!(
            "Open {i},Hard,2023{:02}{:02},Player {},R,185,25.5,Player {},L,190,28.1,6-4 6-4,{},{},{},{}\n",
            i % 12 + 1,
            i % 28 + 1,
            i % 97,
            (i + 13) % 97,
            i % 97 + 1,
            4000 - i % 97,
            (i + 13) % 97 + 1,
            4000 - (i + 13) % 97
        ));
    }
    c.bench_function("csv_read_2k_rows", |b| {
        b.iter(|| {
            let mut summary = LoadSummary::default();
            let rows = read_matches(black_box(csv.as_bytes()), &mut summary).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_feature_table(c: &mut Criterion) {
    let corpus = sample_corpus(7);
    c.bench_function("feature_table_20k", |b| {
        b.iter(|| {
            let table = assemble_feature_table(black_box(&corpus), 5);
            black_box(table.rows.len());
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let corpus = sample_corpus(11);
    let rows = assemble_feature_table(&corpus, 5).rows;
    let cfg = TrainingConfig {
        iterations: 50,
        ..TrainingConfig::default()
    };
    let model: LogisticModel = train(&rows, &cfg).unwrap().model;
    let engine = Engine::from_corpus(corpus, 5, Box::new(model));
    c.bench_function("predict_symmetric", |b| {
        b.iter(|| {
            let p = engine
                .predict_win_probability(black_box("Player 004"), black_box("Player 117"))
                .unwrap();
            black_box(p.prob_a);
        })
    });
}

criterion_group!(perf, bench_csv_read, bench_feature_table, bench_predict);
criterion_main!(perf);
