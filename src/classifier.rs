use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::features::{FEATURE_NAMES, FeatureVector, NUMERIC_FEATURE_NAMES};

pub const MODEL_VERSION: u32 = 1;

/// Binary classifier over a directional feature vector.
///
/// Implementations are loaded once and never mutated, so one instance can serve
/// concurrent callers.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Probability that the subject of `features` wins.
    fn score(&self, features: &FeatureVector) -> Result<f64, AnalyticsError>;
}

/// Logistic model over standardized numeric features plus one weight per
/// hand match-up category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub version: u32,
    pub feature_names: Vec<String>,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    pub intercept: f64,
    #[serde(default)]
    pub hand_matchup_coeffs: BTreeMap<String, f64>,
    #[serde(default)]
    pub l2: f64,
    #[serde(default)]
    pub train_samples: usize,
    #[serde(default)]
    pub val_samples: usize,
    #[serde(default)]
    pub train_log_loss: f64,
    #[serde(default)]
    pub val_log_loss: f64,
    #[serde(default)]
    pub baseline_val_log_loss: f64,
    #[serde(default)]
    pub trained_at: Option<String>,
}

impl LogisticModel {
    /// A model that scores every match-up at 0.5.
    pub fn neutral() -> Self {
        let n = NUMERIC_FEATURE_NAMES.len();
        Self {
            version: MODEL_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            feature_means: vec![0.0; n],
            feature_stds: vec![1.0; n],
            coeffs: vec![0.0; n],
            intercept: 0.0,
            hand_matchup_coeffs: BTreeMap::new(),
            l2: 0.0,
            train_samples: 0,
            val_samples: 0,
            train_log_loss: 0.0,
            val_log_loss: 0.0,
            baseline_val_log_loss: 0.0,
            trained_at: None,
        }
    }

    /// Checks the artifact against the scoring schema.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.feature_names.len() != FEATURE_NAMES.len()
            || self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES)
                .any(|(found, expected)| found != expected)
        {
            return Err(AnalyticsError::SchemaMismatch {
                expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                found: self.feature_names.clone(),
            });
        }
        let n = NUMERIC_FEATURE_NAMES.len();
        if self.coeffs.len() != n || self.feature_means.len() != n || self.feature_stds.len() != n
        {
            return Err(AnalyticsError::MalformedModel(format!(
                "expected {n} coefficients, means and stds (got {}, {}, {})",
                self.coeffs.len(),
                self.feature_means.len(),
                self.feature_stds.len()
            )));
        }
        if self.feature_stds.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(AnalyticsError::MalformedModel(
                "feature stds must be finite and positive".to_string(),
            ));
        }
        let all_params = self
            .coeffs
            .iter()
            .chain(&self.feature_means)
            .chain(self.hand_matchup_coeffs.values())
            .chain(std::iter::once(&self.intercept));
        if all_params.into_iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::MalformedModel(
                "non-finite model parameter".to_string(),
            ));
        }
        Ok(())
    }

    /// Log-odds that the subject wins. Unseen hand match-ups contribute nothing.
    pub fn logit(&self, features: &FeatureVector) -> f64 {
        let mut z = self.intercept;
        for (idx, raw) in features.numeric().into_iter().enumerate() {
            z += self.coeffs[idx] * (raw - self.feature_means[idx]) / self.feature_stds[idx];
        }
        z += self
            .hand_matchup_coeffs
            .get(&features.hand_matchup.label())
            .copied()
            .unwrap_or(0.0);
        z
    }
}

impl Classifier for LogisticModel {
    fn name(&self) -> &str {
        "logistic"
    }

    fn score(&self, features: &FeatureVector) -> Result<f64, AnalyticsError> {
        features.validate()?;
        Ok(sigmoid(self.logit(features)))
    }
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

pub fn load_model(path: &Path) -> Result<LogisticModel> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model artifact {}", path.display()))?;
    let model = serde_json::from_str::<LogisticModel>(&raw)
        .with_context(|| format!("decode model artifact {}", path.display()))?;
    model
        .validate()
        .with_context(|| format!("validate model artifact {}", path.display()))?;
    Ok(model)
}

pub fn save_model(path: &Path, model: &LogisticModel) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(model).context("serialize model artifact")?;
    fs::write(&tmp, json)
        .with_context(|| format!("write model artifact {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("swap model artifact into {}", path.display()))?;
    Ok(())
}
