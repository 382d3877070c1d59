use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::calibration::{
    CalibrationBin, Metrics, base_rate_log_loss, calibration_bins, evaluate_probs,
};
use crate::classifier::Classifier;
use crate::features::FeatureRow;

pub const DEFAULT_CALIBRATION_BINS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub matches: usize,
    pub skipped: usize,
    /// Single directional score, `score(F(a, b))`.
    pub raw: Metrics,
    /// Averaged two-direction probability.
    pub symmetric: Metrics,
    pub calibration: Vec<CalibrationBin>,
    /// Log loss of always predicting the share of first-player wins.
    pub base_rate_log_loss: f64,
    /// Mean of `|raw_a - (1 - raw_b)|`.
    pub mean_asymmetry: f64,
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    raw: f64,
    symmetric: f64,
    asymmetry: f64,
    outcome: bool,
}

/// Scores every row from the side of the name-ordered first player, so the
/// outcome is a real coin flip rather than always "winner wins".
pub fn evaluate_rows(model: &dyn Classifier, rows: &[FeatureRow], bins: usize) -> EvaluationReport {
    let scored = rows
        .par_iter()
        .map(|row| score_row(model, row))
        .collect::<Vec<_>>();

    let skipped = scored.iter().filter(|s| s.is_none()).count();
    if skipped > 0 {
        warn!(skipped, "rows failed to score");
    }
    let scored = scored.into_iter().flatten().collect::<Vec<_>>();

    let outcomes = scored.iter().map(|s| s.outcome).collect::<Vec<_>>();
    let raw_preds = scored.iter().map(|s| s.raw).collect::<Vec<_>>();
    let sym_preds = scored.iter().map(|s| s.symmetric).collect::<Vec<_>>();
    let mean_asymmetry = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|s| s.asymmetry).sum::<f64>() / scored.len() as f64
    };

    let report = EvaluationReport {
        matches: scored.len(),
        skipped,
        raw: evaluate_probs(&raw_preds, &outcomes),
        symmetric: evaluate_probs(&sym_preds, &outcomes),
        calibration: calibration_bins(&sym_preds, &outcomes, bins),
        base_rate_log_loss: base_rate_log_loss(&outcomes),
        mean_asymmetry,
    };
    info!(
        matches = report.matches,
        raw_log_loss = report.raw.log_loss,
        symmetric_log_loss = report.symmetric.log_loss,
        mean_asymmetry = report.mean_asymmetry,
        "evaluation complete"
    );
    report
}

fn score_row(model: &dyn Classifier, row: &FeatureRow) -> Option<Scored> {
    let winner_first = row.record.winner.name <= row.record.loser.name;
    let forward = if winner_first {
        row.features
    } else {
        row.features.flipped()
    };
    let raw_a = model.score(&forward).ok()?;
    let raw_b = model.score(&forward.flipped()).ok()?;
    Some(Scored {
        raw: raw_a,
        symmetric: (raw_a + (1.0 - raw_b)) / 2.0,
        asymmetry: (raw_a - (1.0 - raw_b)).abs(),
        outcome: winner_first,
    })
}
