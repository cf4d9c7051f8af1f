use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use client_core::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "breaches.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    /// `None` fetches the whole list at once.
    pub page_size: Option<usize>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            page_size: None,
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    endpoint: Option<String>,
    page_size: Option<usize>,
    user_agent: Option<String>,
}

/// Defaults, then the settings file, then environment overrides.
///
/// An explicit `config_path` must exist; the default `breaches.toml` is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
    };
    if required || path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        apply_file_settings(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", path.display()))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

pub(crate) fn apply_file_settings(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.endpoint {
        settings.endpoint = v;
    }
    if let Some(v) = file_cfg.page_size {
        settings.page_size = normalize_page_size(v);
    }
    if let Some(v) = file_cfg.user_agent {
        settings.user_agent = v;
    }
    Ok(())
}

pub(crate) fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for key in ["BREACHES_ENDPOINT", "APP__ENDPOINT"] {
        if let Some(v) = lookup(key) {
            settings.endpoint = v;
        }
    }

    for key in ["BREACHES_PAGE_SIZE", "APP__PAGE_SIZE"] {
        if let Some(v) = lookup(key) {
            match v.trim().parse::<usize>() {
                Ok(parsed) => settings.page_size = normalize_page_size(parsed),
                Err(err) => warn!(key, value = %v, error = %err, "ignoring invalid page size"),
            }
        }
    }

    if let Some(v) = lookup("BREACHES_USER_AGENT") {
        settings.user_agent = v;
    }
}

/// Zero means "no paging".
pub(crate) fn normalize_page_size(page_size: usize) -> Option<usize> {
    (page_size > 0).then_some(page_size)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
