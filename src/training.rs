use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::calibration::{Metrics, evaluate_probs};
use crate::classifier::{Classifier, LogisticModel, MODEL_VERSION, sigmoid};
use crate::features::{FEATURE_NAMES, FeatureRow, FeatureVector, NUMERIC_FEATURE_NAMES};

const N_NUMERIC: usize = NUMERIC_FEATURE_NAMES.len();

#[derive(Debug, Clone, Copy)]
pub struct TrainingConfig {
    /// Share of the most recent matches held out for validation.
    pub validation_fraction: f64,
    pub learning_rate: f64,
    pub iterations: usize,
    pub l2: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            validation_fraction: 0.2,
            learning_rate: 0.5,
            iterations: 400,
            l2: 1e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledSample {
    pub features: FeatureVector,
    /// Whether the subject of `features` won.
    pub label: bool,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model: LogisticModel,
    pub train: Metrics,
    pub validation: Metrics,
    pub baseline_log_loss: f64,
}

/// Each row becomes a win from the winner's side and a loss from the loser's side.
pub fn flip_augment(rows: &[FeatureRow]) -> Vec<LabeledSample> {
    rows.iter()
        .flat_map(|row| {
            [
                LabeledSample {
                    features: row.features,
                    label: true,
                },
                LabeledSample {
                    features: row.features.flipped(),
                    label: false,
                },
            ]
        })
        .collect()
}

/// Splits time-ordered rows into (train, validation). Matches sharing a date with
/// the first validation match move to validation too.
pub fn chronological_split(
    rows: &[FeatureRow],
    validation_fraction: f64,
) -> (&[FeatureRow], &[FeatureRow]) {
    let n = rows.len();
    let held_out = (n as f64 * validation_fraction.clamp(0.0, 1.0)).ceil() as usize;
    let mut cut = n.saturating_sub(held_out);
    while cut > 0 && cut < n && rows[cut - 1].record.date == rows[cut].record.date {
        cut -= 1;
    }
    rows.split_at(cut)
}

pub fn train(rows: &[FeatureRow], cfg: &TrainingConfig) -> Result<TrainingReport> {
    let (train_rows, val_rows) = chronological_split(rows, cfg.validation_fraction);
    if train_rows.is_empty() {
        bail!(
            "no training rows left after holding out {} validation rows",
            val_rows.len()
        );
    }

    let train_samples = usable(flip_augment(train_rows));
    let val_samples = usable(flip_augment(val_rows));
    info!(
        train_rows = train_rows.len(),
        val_rows = val_rows.len(),
        train_samples = train_samples.len(),
        val_samples = val_samples.len(),
        "training logistic model"
    );

    let mut model = fit_logistic(&train_samples, cfg);
    let train = score_samples(&model, &train_samples);
    let validation = score_samples(&model, &val_samples);
    let outcomes = val_samples.iter().map(|s| s.label).collect::<Vec<_>>();
    let baseline_log_loss = evaluate_probs(&vec![0.5; outcomes.len()], &outcomes).log_loss;

    model.train_samples = train_samples.len();
    model.val_samples = val_samples.len();
    model.train_log_loss = train.log_loss;
    model.val_log_loss = validation.log_loss;
    model.baseline_val_log_loss = baseline_log_loss;
    model.trained_at = Some(Utc::now().to_rfc3339());

    Ok(TrainingReport {
        model,
        train,
        validation,
        baseline_log_loss,
    })
}

/// Full-batch gradient descent on standardized numerics plus one weight per
/// hand match-up seen in `samples`.
pub fn fit_logistic(samples: &[LabeledSample], cfg: &TrainingConfig) -> LogisticModel {
    let mut model = LogisticModel::neutral();
    model.version = MODEL_VERSION;
    model.feature_names = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();
    model.l2 = cfg.l2;
    if samples.is_empty() {
        return model;
    }

    let (means, stds) = moments(samples);
    let n = samples.len() as f64;

    let mut categories: BTreeMap<String, usize> = BTreeMap::new();
    let encoded = samples
        .iter()
        .map(|s| {
            let next = categories.len();
            let cat = *categories
                .entry(s.features.hand_matchup.label())
                .or_insert(next);
            let raw = s.features.numeric();
            let mut x = [0.0; N_NUMERIC];
            for j in 0..N_NUMERIC {
                x[j] = (raw[j] - means[j]) / stds[j];
            }
            (x, cat, if s.label { 1.0 } else { 0.0 })
        })
        .collect::<Vec<_>>();

    let mut w = [0.0_f64; N_NUMERIC];
    let mut h = vec![0.0_f64; categories.len()];
    let mut b = 0.0_f64;

    for iter in 0..cfg.iterations {
        let mut grad_w = [0.0_f64; N_NUMERIC];
        let mut grad_h = vec![0.0_f64; h.len()];
        let mut grad_b = 0.0_f64;
        for (x, cat, y) in &encoded {
            let z = b + h[*cat] + w.iter().zip(x).map(|(wj, xj)| wj * xj).sum::<f64>();
            let err = sigmoid(z) - y;
            for j in 0..N_NUMERIC {
                grad_w[j] += err * x[j];
            }
            grad_h[*cat] += err;
            grad_b += err;
        }
        for j in 0..N_NUMERIC {
            w[j] -= cfg.learning_rate * (grad_w[j] / n + cfg.l2 * w[j]);
        }
        for (hk, gk) in h.iter_mut().zip(&grad_h) {
            *hk -= cfg.learning_rate * (gk / n + cfg.l2 * *hk);
        }
        b -= cfg.learning_rate * grad_b / n;

        if iter % 100 == 0 {
            debug!(iter, grad_b = grad_b / n, "gradient step");
        }
    }

    model.feature_means = means.to_vec();
    model.feature_stds = stds.to_vec();
    model.coeffs = w.to_vec();
    model.intercept = b;
    model.hand_matchup_coeffs = categories
        .into_iter()
        .map(|(label, idx)| (label, h[idx]))
        .collect();
    model
}

fn moments(samples: &[LabeledSample]) -> ([f64; N_NUMERIC], [f64; N_NUMERIC]) {
    let n = samples.len() as f64;
    let mut means = [0.0; N_NUMERIC];
    for s in samples {
        for (m, v) in means.iter_mut().zip(s.features.numeric()) {
            *m += v / n;
        }
    }
    let mut stds = [0.0; N_NUMERIC];
    for s in samples {
        for (j, v) in s.features.numeric().into_iter().enumerate() {
            stds[j] += (v - means[j]).powi(2) / n;
        }
    }
    for sd in &mut stds {
        *sd = sd.sqrt();
        // Constant columns keep a unit scale.
        if *sd < 1e-12 {
            *sd = 1.0;
        }
    }
    (means, stds)
}

fn usable(samples: Vec<LabeledSample>) -> Vec<LabeledSample> {
    let before = samples.len();
    let kept = samples
        .into_iter()
        .filter(|s| s.features.validate().is_ok())
        .collect::<Vec<_>>();
    if kept.len() != before {
        warn!(dropped = before - kept.len(), "skipping samples with invalid features");
    }
    kept
}

/// Metrics of `model` over labeled samples. Scoring failures are skipped.
pub fn score_samples(model: &dyn Classifier, samples: &[LabeledSample]) -> Metrics {
    let mut preds = Vec::with_capacity(samples.len());
    let mut outcomes = Vec::with_capacity(samples.len());
    for s in samples {
        if let Ok(p) = model.score(&s.features) {
            preds.push(p);
            outcomes.push(s.label);
        }
    }
    evaluate_probs(&preds, &outcomes)
}
