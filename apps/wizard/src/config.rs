use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "rooftop.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub database_url: String,
    pub session_id: Option<String>,
    /// Remembers the active session between invocations when no id is configured.
    pub session_file: String,
    pub baseline_surface_temp_c: Option<f64>,
    /// `0` disables the client-side timeout.
    pub request_timeout_seconds: u64,
    pub report_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api/v1".into(),
            database_url: "sqlite://./data/rooftop.db".into(),
            session_id: None,
            session_file: "./data/current_session".into(),
            baseline_surface_temp_c: None,
            request_timeout_seconds: 30,
            report_dir: "./reports".into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_seconds > 0).then(|| Duration::from_secs(self.request_timeout_seconds))
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the flat `key = "value"` file, then the environment.
pub fn load_settings_from(config_file: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_file) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("api_base_url") {
                    settings.api_base_url = v.clone();
                }
                if let Some(v) = file_cfg.get("database_url") {
                    settings.database_url = v.clone();
                }
                if let Some(v) = file_cfg.get("session_id") {
                    settings.session_id = Some(v.clone());
                }
                if let Some(v) = file_cfg.get("session_file") {
                    settings.session_file = v.clone();
                }
                if let Some(v) = file_cfg.get("baseline_surface_temp_c") {
                    apply_baseline(&mut settings, v);
                }
                if let Some(v) = file_cfg.get("request_timeout_seconds") {
                    apply_timeout(&mut settings, v);
                }
                if let Some(v) = file_cfg.get("report_dir") {
                    settings.report_dir = v.clone();
                }
            }
            Err(err) => tracing::warn!(
                file = %config_file.display(),
                error = %err,
                "ignoring unreadable config file"
            ),
        }
    }

    if let Some(v) = env("ROOFTOP_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__SESSION_ID") {
        settings.session_id = Some(v);
    }
    if let Some(v) = env("APP__SESSION_FILE") {
        settings.session_file = v;
    }

    if let Some(v) = env("APP__BASELINE_SURFACE_TEMP_C") {
        apply_baseline(&mut settings, &v);
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        apply_timeout(&mut settings, &v);
    }
    if let Some(v) = env("APP__REPORT_DIR") {
        settings.report_dir = v;
    }

    settings
}

fn apply_baseline(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => settings.baseline_surface_temp_c = Some(parsed),
        _ => tracing::warn!(value = raw, "ignoring invalid baseline surface temperature"),
    }
}

fn apply_timeout(settings: &mut Settings, raw: &str) {
    match raw.trim().parse::<u64>() {
        Ok(parsed) => settings.request_timeout_seconds = parsed,
        Err(_) => tracing::warn!(value = raw, "ignoring invalid request timeout"),
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}
