//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file. Every value has a compiled
//! default so a missing file never prevents startup.
//!
//! Priority order for values that can be overridden:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "ROLLCALL_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "rollcall.db";

/// Default upload ceiling (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Folder holding the database and the upload scratch directory
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen address, e.g. "127.0.0.1:5730"
    #[serde(default)]
    pub bind: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub recognizer: RecognizerConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub attendance: AttendanceConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External face-recognition engine invocation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecognizerConfig {
    /// Executable to launch
    #[serde(default = "default_recognizer_program")]
    pub program: String,

    /// Arguments placed before the mode and image path
    #[serde(default = "default_recognizer_args")]
    pub args: Vec<String>,

    /// Upper bound on a single engine invocation
    #[serde(default = "default_recognizer_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional minimum confidence (0-100). Unset means every match is accepted.
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            program: default_recognizer_program(),
            args: default_recognizer_args(),
            timeout_ms: default_recognizer_timeout_ms(),
            min_confidence: None,
        }
    }
}

/// Upload intake limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,

    /// Scratch directory for uploads (defaults to `<root_folder>/uploads`)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
            dir: None,
        }
    }
}

/// Attendance write policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AttendanceConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

/// What the attendance writer does when an entry for the same
/// (student, class, day) already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the existing entry and report the identity as already marked
    #[default]
    Skip,
    /// Fail the whole batch with a conflict
    Reject,
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(DuplicatePolicy::Skip),
            "reject" => Ok(DuplicatePolicy::Reject),
            other => Err(Error::Config(format!(
                "Unknown duplicate policy '{}' (expected 'skip' or 'reject')",
                other
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_recognizer_program() -> String {
    "python3".to_string()
}

fn default_recognizer_args() -> Vec<String> {
    vec!["facial-recognition.py".to_string()]
}

fn default_recognizer_timeout_ms() -> u64 {
    30_000
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// Default configuration file path (`~/.config/rollcall/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rollcall").join("config.toml"))
}

/// Load the TOML bootstrap configuration
///
/// An explicitly requested file must exist. When no file is requested the
/// default location is tried, and a missing default file falls back to
/// compiled defaults with a warning.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("No config file found, using compiled defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse TOML text into a [`TomlConfig`]
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Resolve the root folder: CLI → environment → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rollcall"))
        .unwrap_or_else(|| PathBuf::from("./rollcall_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root_folder: &Path) -> Result<PathBuf> {
    if !root_folder.exists() {
        std::fs::create_dir_all(root_folder)?;
        info!("Created root folder: {}", root_folder.display());
    }
    Ok(root_folder.join(DATABASE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.recognizer.program, "python3");
        assert_eq!(config.recognizer.timeout_ms, 30_000);
        assert!(config.recognizer.min_confidence.is_none());
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.attendance.duplicate_policy, DuplicatePolicy::Skip);
    }

    #[test]
    fn test_sections_parse() {
        let config = parse_toml_config(
            r#"
            root_folder = "/srv/rollcall"
            bind = "0.0.0.0:8080"

            [recognizer]
            program = "/usr/local/bin/face-engine"
            args = []
            timeout_ms = 5000
            min_confidence = 60.0

            [upload]
            max_bytes = 2048

            [attendance]
            duplicate_policy = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/rollcall")));
        assert_eq!(config.bind.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(config.recognizer.program, "/usr/local/bin/face-engine");
        assert!(config.recognizer.args.is_empty());
        assert_eq!(config.recognizer.min_confidence, Some(60.0));
        assert_eq!(config.upload.max_bytes, 2048);
        assert_eq!(config.attendance.duplicate_policy, DuplicatePolicy::Reject);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = parse_toml_config("bind = [").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_duplicate_policy_from_str() {
        assert_eq!("skip".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Skip);
        assert_eq!(" REJECT ".parse::<DuplicatePolicy>().unwrap(), DuplicatePolicy::Reject);
        assert!("upsert".parse::<DuplicatePolicy>().is_err());
    }
}
