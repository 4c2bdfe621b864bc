//! Runtime configuration.
//!
//! # Responsibility
//! - Merge an optional TOML file with environment overrides.
//! - Validate the token secret and time windows before anything starts.
//!
//! # Invariants
//! - Environment values win over file values.
//! - `qr_secret_key` is required and never printed by `Debug`.
//!
//! Recognized environment variables:
//! `QR_SECRET_KEY`, `QR_EXPIRATION` (scan tolerance, seconds),
//! `QRATTEND_TOKEN_FRESHNESS` (issue refresh interval, seconds),
//! `QRATTEND_DATABASE`, `QRATTEND_LOG_LEVEL`, `QRATTEND_LOG_DIR`.

use crate::token::{TokenError, TokenSigner, DEFAULT_EXPIRATION_SECS, DEFAULT_TOLERANCE_SECS};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_SECRET_KEY: &str = "QR_SECRET_KEY";
pub const ENV_TOLERANCE: &str = "QR_EXPIRATION";
pub const ENV_FRESHNESS: &str = "QRATTEND_TOKEN_FRESHNESS";
pub const ENV_DATABASE: &str = "QRATTEND_DATABASE";
pub const ENV_LOG_LEVEL: &str = "QRATTEND_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "QRATTEND_LOG_DIR";

const DEFAULT_DATABASE_PATH: &str = "qrattend.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Missing(&'static str),
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Missing(key) => write!(f, "missing required setting `{key}`"),
            Self::InvalidValue { key, value } => {
                write!(f, "`{key}` must be a positive integer, got `{value}`")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// On-disk shape. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_path: Option<PathBuf>,
    qr_secret_key: Option<String>,
    qr_expiration: Option<u64>,
    token_freshness: Option<u64>,
    log_level: Option<String>,
    log_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub qr_secret_key: String,
    /// Maximum token age accepted on scan.
    pub qr_tolerance_secs: u64,
    /// Refresh interval advertised with each issued code.
    pub qr_freshness_secs: u64,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Loads config from `path` (if given) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::load`] with an injectable environment lookup.
    pub fn load_with(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let qr_secret_key = env(ENV_SECRET_KEY)
            .or(file.qr_secret_key)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing(ENV_SECRET_KEY))?;

        let qr_tolerance_secs = match env(ENV_TOLERANCE) {
            Some(raw) => parse_positive(ENV_TOLERANCE, &raw)?,
            None => positive_or_default(ENV_TOLERANCE, file.qr_expiration, DEFAULT_TOLERANCE_SECS)?,
        };
        let qr_freshness_secs = match env(ENV_FRESHNESS) {
            Some(raw) => parse_positive(ENV_FRESHNESS, &raw)?,
            None => positive_or_default(
                ENV_FRESHNESS,
                file.token_freshness,
                DEFAULT_EXPIRATION_SECS,
            )?,
        };

        Ok(Self {
            database_path: env(ENV_DATABASE)
                .map(PathBuf::from)
                .or(file.database_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            qr_secret_key,
            qr_tolerance_secs,
            qr_freshness_secs,
            log_level: env(ENV_LOG_LEVEL)
                .or(file.log_level)
                .unwrap_or_else(|| crate::logging::default_log_level().to_string()),
            log_dir: env(ENV_LOG_DIR).map(PathBuf::from).or(file.log_dir),
        })
    }

    /// Builds the token signer for this configuration.
    pub fn token_signer(&self) -> Result<TokenSigner, TokenError> {
        TokenSigner::new(
            self.qr_secret_key.clone(),
            self.qr_freshness_secs,
            self.qr_tolerance_secs,
        )
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_path", &self.database_path)
            .field("qr_secret_key", &"<redacted>")
            .field("qr_tolerance_secs", &self.qr_tolerance_secs)
            .field("qr_freshness_secs", &self.qr_freshness_secs)
            .field("log_level", &self.log_level)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}

fn positive_or_default(
    key: &'static str,
    value: Option<u64>,
    default: u64,
) -> Result<u64, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::InvalidValue {
            key,
            value: "0".to_string(),
        }),
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, ENV_DATABASE, ENV_SECRET_KEY, ENV_TOLERANCE};
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn secret_is_required() {
        let err = AppConfig::load_with(None, env_of(&[])).expect_err("secret required");
        assert!(matches!(err, ConfigError::Missing(ENV_SECRET_KEY)));

        let err = AppConfig::load_with(None, env_of(&[(ENV_SECRET_KEY, "  ")]))
            .expect_err("blank secret is missing");
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = AppConfig::load_with(None, env_of(&[(ENV_SECRET_KEY, "k")])).unwrap();
        assert_eq!(config.qr_tolerance_secs, 60);
        assert_eq!(config.qr_freshness_secs, 60);
        assert_eq!(config.database_path, PathBuf::from("qrattend.sqlite3"));
        assert!(config.log_dir.is_none());
        assert!(!format!("{config:?}").contains("\"k\""));
    }

    #[test]
    fn tolerance_must_be_positive_integer() {
        for bad in ["0", "-5", "sixty"] {
            let err = AppConfig::load_with(
                None,
                env_of(&[(ENV_SECRET_KEY, "k"), (ENV_TOLERANCE, bad)]),
            )
            .expect_err("invalid tolerance");
            assert!(matches!(err, ConfigError::InvalidValue { key: "QR_EXPIRATION", .. }));
        }
    }

    #[test]
    fn env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "qr_secret_key = \"from-file\"\nqr_expiration = 90\ndatabase_path = \"/tmp/file.db\""
        )
        .unwrap();

        let config = AppConfig::load_with(
            Some(file.path()),
            env_of(&[(ENV_DATABASE, "/tmp/env.db")]),
        )
        .unwrap();
        assert_eq!(config.qr_secret_key, "from-file");
        assert_eq!(config.qr_tolerance_secs, 90);
        assert_eq!(config.database_path, PathBuf::from("/tmp/env.db"));

        let signer = config.token_signer().unwrap();
        assert_eq!(signer.tolerance_secs(), 90);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "qr_secret = \"typo\"").unwrap();
        let err = AppConfig::load_with(Some(file.path()), env_of(&[])).expect_err("typo");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
