use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::career::{self, CareerSummary, PlayerReport, SeasonWinner};
use crate::classifier::{Classifier, load_model};
use crate::config::AppConfig;
use crate::corpus::{Corpus, MatchRecord};
use crate::error::AnalyticsError;
use crate::features::{FeatureRow, assemble_with, complete_matches};
use crate::form::RecentFormIndex;
use crate::h2h::HeadToHeadIndex;
use crate::predictor::{MatchupPrediction, PlayerDirectory, PlayerSnapshot, SymmetricPredictor};
use crate::store;

/// Everything the query interface needs, built once and then shared read-only.
pub struct Engine {
    corpus: Corpus,
    rows: Vec<FeatureRow>,
    h2h: HeadToHeadIndex,
    form: RecentFormIndex,
    directory: PlayerDirectory,
    model: Box<dyn Classifier>,
}

impl Engine {
    /// Loads the feature store and the model artifact named by `config`.
    ///
    /// The form window recorded with the latest build wins over the configured
    /// one, so as-of queries agree with the stored rows.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let conn = store::open_db(&config.db_path)?;
        let form_window = match store::latest_build(&conn)? {
            Some(run) => {
                if run.form_window != config.form_window {
                    warn!(
                        stored = run.form_window,
                        configured = config.form_window,
                        "form window differs from the feature store; using the stored one"
                    );
                }
                run.form_window
            }
            None => config.form_window,
        };
        let corpus = store::load_corpus(&conn)?;
        let rows = store::load_feature_rows(&conn)?;
        if rows.is_empty() {
            bail!(
                "feature store {} is empty; run build_features first",
                config.db_path.display()
            );
        }
        let model = load_model(&config.model_path)
            .context("train a model with train_model or set ATP_MODEL_PATH")?;
        Ok(Self::from_parts(
            corpus,
            rows,
            Box::new(model),
            form_window,
        ))
    }

    pub fn from_parts(
        corpus: Corpus,
        rows: Vec<FeatureRow>,
        model: Box<dyn Classifier>,
        form_window: usize,
    ) -> Self {
        let h2h = HeadToHeadIndex::build(rows.iter().map(|r| &r.record));
        let form = RecentFormIndex::build(rows.iter().map(|r| &r.record), form_window);
        let directory = PlayerDirectory::from_rows(&rows).with_history(corpus.matches());
        info!(
            matches = corpus.len(),
            feature_rows = rows.len(),
            players = directory.len(),
            model = model.name(),
            "engine ready"
        );
        Self {
            corpus,
            rows,
            h2h,
            form,
            directory,
            model,
        }
    }

    /// Assembles the feature table in memory instead of reading the store.
    pub fn from_corpus(corpus: Corpus, form_window: usize, model: Box<dyn Classifier>) -> Self {
        let h2h = HeadToHeadIndex::build(complete_matches(&corpus));
        let form = RecentFormIndex::build(complete_matches(&corpus), form_window);
        let rows = assemble_with(&corpus, &h2h, &form).rows;
        let directory = PlayerDirectory::from_rows(&rows).with_history(corpus.matches());
        Self {
            corpus,
            rows,
            h2h,
            form,
            directory,
            model,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn feature_rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn form_window(&self) -> usize {
        self.form.window()
    }

    pub fn players(&self) -> &PlayerDirectory {
        &self.directory
    }

    pub fn predictor(&self) -> SymmetricPredictor<'_> {
        SymmetricPredictor::new(&self.directory, &self.h2h, self.model.as_ref())
    }

    pub fn get_player_stats(&self, name: &str) -> Result<&PlayerSnapshot, AnalyticsError> {
        self.directory.get(name)
    }

    /// `a`'s win rate over every recorded meeting with `b`; 0.5 if they never met.
    pub fn calculate_h2h_winrate(&self, a: &str, b: &str) -> f64 {
        self.h2h.winrate(a, b)
    }

    /// `a`'s win rate over meetings strictly before `date`.
    pub fn h2h_winrate_as_of(&self, a: &str, b: &str, date: NaiveDate) -> f64 {
        self.h2h.winrate_before(a, b, date)
    }

    /// (wins of `a`, wins of `b`) over all meetings.
    pub fn h2h_record(&self, a: &str, b: &str) -> (u32, u32) {
        self.h2h.record(a, b)
    }

    pub fn recent_winrate_as_of(&self, player: &str, date: NaiveDate) -> f64 {
        self.form.winrate_before(player, date)
    }

    pub fn predict_win_probability(
        &self,
        a: &str,
        b: &str,
    ) -> Result<MatchupPrediction, AnalyticsError> {
        self.predictor().predict(a, b)
    }

    pub fn career_summary(&self, player: &str) -> Result<CareerSummary, AnalyticsError> {
        career::career_summary(&self.corpus, player)
    }

    pub fn player_report(&self, player: &str, recent: usize) -> Result<PlayerReport, AnalyticsError> {
        career::player_report(&self.corpus, player, recent)
    }

    pub fn top_winners(&self, year: i32, n: usize) -> Vec<SeasonWinner> {
        career::top_winners(&self.corpus, year, n)
    }

    pub fn players_active_in(&self, year: i32) -> Vec<String> {
        career::players_active_in(&self.corpus, year)
    }

    pub fn recent_h2h(&self, a: &str, b: &str, n: usize) -> Vec<MatchRecord> {
        career::recent_h2h(&self.corpus, a, b, n)
    }
}
