//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$PST_HARVEST_CONFIG` (environment variable)
//! 2. `~/.config/pst-harvest/config.toml` (Linux)
//!    `~/Library/Application Support/pst-harvest/config.toml` (macOS)
//!    `%APPDATA%\pst-harvest\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Output locations.
    pub storage: StorageConfig,
    /// Extraction tuning.
    pub extraction: ExtractionConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Directory for the daily-rotated log files.
    pub log_dir: Option<PathBuf>,
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one SQLite database per archive.
    pub db_dir: PathBuf,
    /// Base directory for extracted attachments.
    pub attachment_dir: PathBuf,
}

/// Extraction tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Records per storage transaction (default: 1).
    pub batch_size: usize,
    /// Offset from UTC, in minutes, for `local_time` and attachment folders
    /// (default: 540 = UTC+9).
    pub utc_offset_minutes: i32,
    /// Folder names treated as sent mail in addition to the built-in ones.
    pub extra_sent_folders: Vec<String>,
    /// Domain for directory-style sender identifiers that carry none.
    pub fallback_domain: Option<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("output"),
            attachment_dir: PathBuf::from("output").join("attachments"),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            utc_offset_minutes: 9 * 60,
            extra_sent_folders: Vec::new(),
            fallback_domain: None,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("PST_HARVEST_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("pst-harvest").join("config.toml"))
}

/// Return the log directory.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pst-harvest")
        .join("logs")
}

/// Database file for an archive: `<db_dir>/<archive stem>.db`.
pub fn database_path(config: &Config, archive_path: &Path) -> PathBuf {
    let stem = archive_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "archive".to_string());
    config.storage.db_dir.join(format!("{stem}.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.extraction.batch_size, 1);
        assert_eq!(cfg.extraction.utc_offset_minutes, 540);
        assert!(cfg.extraction.extra_sent_folders.is_empty());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.storage.db_dir, cfg.storage.db_dir);
        assert_eq!(
            parsed.extraction.utc_offset_minutes,
            cfg.extraction.utc_offset_minutes
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[storage]
db_dir = "/var/lib/harvest"

[extraction]
extra_sent_folders = ["Gesendet"]
fallback_domain = "corp.example"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.storage.db_dir, PathBuf::from("/var/lib/harvest"));
        assert_eq!(cfg.extraction.extra_sent_folders, vec!["Gesendet"]);
        assert_eq!(cfg.extraction.fallback_domain.as_deref(), Some("corp.example"));
        // Other fields use defaults
        assert_eq!(cfg.extraction.batch_size, 1);
        assert_eq!(cfg.storage.attachment_dir, PathBuf::from("output").join("attachments"));
    }

    #[test]
    fn test_database_path_uses_archive_stem() {
        let mut cfg = Config::default();
        cfg.storage.db_dir = PathBuf::from("/data");
        assert_eq!(
            database_path(&cfg, Path::new("/mail/backup.2023.json")),
            PathBuf::from("/data/backup.2023.db")
        );
    }
}
