use thiserror::Error;

/// Errors surfaced to callers of the query interface.
///
/// Data-integrity problems in the raw corpus never show up here: those rows
/// are dropped during loading and only counted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("player not found: {name}")]
    PlayerNotFound { name: String },

    /// The player appears in the corpus, but never in a row with complete stats.
    #[error("no resolvable stats for player: {name}")]
    NoResolvableStats { name: String },

    #[error("invalid feature {feature}: {value}")]
    InvalidFeature { feature: &'static str, value: f64 },

    #[error("feature schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("model artifact is malformed: {0}")]
    MalformedModel(String),
}

impl AnalyticsError {
    pub fn player_not_found(name: &str) -> Self {
        Self::PlayerNotFound {
            name: name.to_string(),
        }
    }
}
