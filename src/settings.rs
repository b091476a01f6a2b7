use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ConferenciaError, Result};

pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite copy of the ERP database.
    #[serde(default)]
    pub database: Option<String>,
    /// SQL returning (document number, party, total value, status code).
    #[serde(default)]
    pub query: Option<String>,
    /// Organization used when `reconcile` gets neither `--org` nor `--all-orgs`.
    #[serde(default)]
    pub default_org_id: Option<i64>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_export_dir")]
    pub export_dir: String,
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_export_dir() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("conferencia")
        .to_string_lossy()
        .to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            query: None,
            default_org_id: None,
            cache_ttl_secs: default_cache_ttl_secs(),
            export_dir: default_export_dir(),
        }
    }
}

/// `~/.config/conferencia`, or `./.config/conferencia` without a home dir.
fn config_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".config/conferencia")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    load_settings_from(&settings_path())
}

/// A missing or unreadable file yields the defaults; fields absent from the
/// file take their defaults too.
pub fn load_settings_from(path: &Path) -> Settings {
    let parsed = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Settings>(&content).ok());
    match parsed {
        Some(settings) => settings,
        None => {
            if path.exists() {
                warn!("ignoring unreadable settings at {}", path.display());
            }
            Settings::default()
        }
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ConferenciaError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Expand a leading `~` to the home directory and make existing paths
/// absolute. Paths that do not exist yet are returned as given.
pub fn shellexpand_path(path: &str) -> String {
    let expanded = match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    };
    std::fs::canonicalize(&expanded)
        .unwrap_or(expanded)
        .to_string_lossy()
        .into_owned()
}
