//! Configuration resolution for rollcall-server
//!
//! Merges command-line flags (which clap also fills from `ROLLCALL_*`
//! environment variables) over the TOML bootstrap file and compiled defaults.

use clap::Parser;
use rollcall_common::config::{
    prepare_root_folder, resolve_root_folder, DuplicatePolicy, RecognizerConfig, TomlConfig,
};
use rollcall_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5730";

/// Command-line interface
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "rollcall-server", version, about = "School attendance service with facial-recognition intake")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "ROLLCALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Folder holding the database and upload scratch space
    #[arg(long)]
    pub root_folder: Option<PathBuf>,

    /// HTTP listen address
    #[arg(long, env = "ROLLCALL_BIND")]
    pub bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ROLLCALL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Recognizer executable
    #[arg(long, env = "ROLLCALL_RECOGNIZER_PROGRAM")]
    pub recognizer_program: Option<String>,

    /// Recognizer timeout in milliseconds
    #[arg(long, env = "ROLLCALL_RECOGNIZER_TIMEOUT_MS")]
    pub recognizer_timeout_ms: Option<u64>,

    /// Minimum accepted recognition confidence (0-100)
    #[arg(long, env = "ROLLCALL_MIN_CONFIDENCE")]
    pub min_confidence: Option<f64>,

    /// Upload size ceiling in bytes
    #[arg(long, env = "ROLLCALL_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Duplicate attendance policy: skip or reject
    #[arg(long, env = "ROLLCALL_DUPLICATE_POLICY")]
    pub duplicate_policy: Option<DuplicatePolicy>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub bind: String,
    pub log_level: String,
    pub recognizer: RecognizerConfig,
    pub service: ServiceSettings,
}

/// Settings consulted by request handlers
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub duplicate_policy: DuplicatePolicy,
    pub min_confidence: Option<f64>,
}

impl ServiceSettings {
    /// Defaults rooted at `upload_dir`, used by tests and embedding code
    pub fn with_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_upload_bytes: rollcall_common::config::DEFAULT_MAX_UPLOAD_BYTES,
            duplicate_policy: DuplicatePolicy::default(),
            min_confidence: None,
        }
    }
}

impl ServerConfig {
    /// Resolve configuration: CLI/ENV → TOML → defaults
    ///
    /// Creates the root folder so the database path is usable.
    pub fn resolve(cli: &Cli, toml_config: &TomlConfig) -> Result<Self> {
        let root_folder = resolve_root_folder(cli.root_folder.as_deref(), toml_config);
        let database_path = prepare_root_folder(&root_folder)?;

        let mut recognizer = toml_config.recognizer.clone();
        if let Some(program) = &cli.recognizer_program {
            recognizer.program = program.clone();
        }
        if let Some(timeout_ms) = cli.recognizer_timeout_ms {
            recognizer.timeout_ms = timeout_ms;
        }
        if cli.min_confidence.is_some() {
            recognizer.min_confidence = cli.min_confidence;
        }

        if recognizer.program.trim().is_empty() {
            return Err(Error::Config("Recognizer program must not be empty".to_string()));
        }
        if recognizer.timeout_ms == 0 {
            return Err(Error::Config("Recognizer timeout must be positive".to_string()));
        }
        if let Some(min) = recognizer.min_confidence {
            if !(0.0..=100.0).contains(&min) {
                return Err(Error::Config(format!(
                    "min_confidence must be within 0-100, got {}",
                    min
                )));
            }
        }

        let max_upload_bytes = cli.max_upload_bytes.unwrap_or(toml_config.upload.max_bytes);
        if max_upload_bytes == 0 {
            return Err(Error::Config("Upload ceiling must be positive".to_string()));
        }

        let upload_dir = toml_config
            .upload
            .dir
            .clone()
            .unwrap_or_else(|| root_folder.join("uploads"));

        let service = ServiceSettings {
            upload_dir,
            max_upload_bytes,
            duplicate_policy: cli
                .duplicate_policy
                .unwrap_or(toml_config.attendance.duplicate_policy),
            min_confidence: recognizer.min_confidence,
        };

        Ok(Self {
            root_folder,
            database_path,
            bind: cli
                .bind
                .clone()
                .or_else(|| toml_config.bind.clone())
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            log_level: cli
                .log_level
                .clone()
                .unwrap_or_else(|| toml_config.logging.level.clone()),
            recognizer,
            service,
        })
    }

    pub fn recognizer_timeout(&self) -> Duration {
        Duration::from_millis(self.recognizer.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_common::config::parse_toml_config;
    use tempfile::TempDir;

    fn cli_with_root(root: &std::path::Path) -> Cli {
        Cli {
            root_folder: Some(root.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_when_nothing_configured() {
        let temp_dir = TempDir::new().unwrap();
        let config = ServerConfig::resolve(&cli_with_root(temp_dir.path()), &TomlConfig::default())
            .unwrap();

        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_path, temp_dir.path().join("rollcall.db"));
        assert_eq!(config.service.upload_dir, temp_dir.path().join("uploads"));
        assert_eq!(config.service.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.service.duplicate_policy, DuplicatePolicy::Skip);
        assert_eq!(config.recognizer_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_cli_overrides_toml() {
        let temp_dir = TempDir::new().unwrap();
        let toml = parse_toml_config(
            r#"
            bind = "0.0.0.0:1111"
            [recognizer]
            program = "from-toml"
            timeout_ms = 1000
            [attendance]
            duplicate_policy = "skip"
            "#,
        )
        .unwrap();

        let cli = Cli {
            bind: Some("127.0.0.1:2222".to_string()),
            recognizer_program: Some("from-cli".to_string()),
            duplicate_policy: Some(DuplicatePolicy::Reject),
            min_confidence: Some(75.0),
            ..cli_with_root(temp_dir.path())
        };

        let config = ServerConfig::resolve(&cli, &toml).unwrap();
        assert_eq!(config.bind, "127.0.0.1:2222");
        assert_eq!(config.recognizer.program, "from-cli");
        assert_eq!(config.recognizer.timeout_ms, 1000);
        assert_eq!(config.service.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.service.min_confidence, Some(75.0));
    }

    #[test]
    fn test_out_of_range_confidence_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let cli = Cli {
            min_confidence: Some(120.0),
            ..cli_with_root(temp_dir.path())
        };
        assert!(ServerConfig::resolve(&cli, &TomlConfig::default()).is_err());
    }

    #[test]
    fn test_zero_upload_ceiling_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let cli = Cli {
            max_upload_bytes: Some(0),
            ..cli_with_root(temp_dir.path())
        };
        assert!(ServerConfig::resolve(&cli, &TomlConfig::default()).is_err());
    }
}
