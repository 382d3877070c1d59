use std::path::PathBuf;

use crate::form::DEFAULT_FORM_WINDOW;

const APP_DIR: &str = "atp_matchup";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub model_path: PathBuf,
    pub form_window: usize,
}

impl AppConfig {
    /// Reads `.env.local` / `.env` and then the `ATP_*` variables.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let base = app_data_dir().unwrap_or_else(|| PathBuf::from("."));
        let data_dir = env_path("ATP_DATA_DIR").unwrap_or_else(|| PathBuf::from("data"));
        let db_path = env_path("ATP_DB_PATH").unwrap_or_else(|| base.join("features.sqlite"));
        let model_path =
            env_path("ATP_MODEL_PATH").unwrap_or_else(|| base.join("match_model.json"));
        let form_window = std::env::var("ATP_FORM_WINDOW")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_FORM_WINDOW)
            .max(1);

        Self {
            data_dir,
            db_path,
            model_path,
            form_window,
        }
    }
}

/// `$XDG_DATA_HOME/atp_matchup`, falling back to `~/.local/share/atp_matchup`.
pub fn app_data_dir() -> Option<PathBuf> {
    if let Some(base) = env_path("XDG_DATA_HOME") {
        return Some(base.join(APP_DIR));
    }
    let home = env_path("HOME")?;
    Some(home.join(".local").join("share").join(APP_DIR))
}

fn env_path(key: &str) -> Option<PathBuf> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}
