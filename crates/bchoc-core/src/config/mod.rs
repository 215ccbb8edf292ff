//! Configuration parsing and ledger path resolution.
//!
//! The ledger location is an explicit value threaded into
//! [`ChainStore::from_config`](crate::store::ChainStore::from_config); nothing
//! in the core reads process-wide state. Callers resolve it with
//! [`LedgerConfig::resolve`], which applies, in order of precedence:
//!
//! 1. an explicit path (e.g. a `--file` flag),
//! 2. the `BCHOC_FILE_PATH` environment variable,
//! 3. the `[ledger] path` key of an optional TOML file,
//! 4. the default `./bchoc`.
//!
//! ```toml
//! [ledger]
//! path = "/var/lib/bchoc/ledger"
//! fsync = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the ledger file.
pub const LEDGER_PATH_ENV: &str = "BCHOC_FILE_PATH";

/// Ledger file used when nothing else is configured.
pub const DEFAULT_LEDGER_PATH: &str = "./bchoc";

/// Errors from loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BchocConfig {
    /// Ledger storage settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

impl BchocConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or `ledger.path` is empty.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if config.ledger.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "ledger.path must not be empty".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Where and how the ledger file is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Path of the ledger file.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,

    /// Whether each append is fsynced before returning.
    #[serde(default = "default_fsync")]
    pub fsync: bool,
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from(DEFAULT_LEDGER_PATH)
}

const fn default_fsync() -> bool {
    true
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
            fsync: default_fsync(),
        }
    }
}

impl LedgerConfig {
    /// Resolves the ledger configuration.
    ///
    /// `config_file` is only read if it exists. `env` looks up environment
    /// variables; pass `|k| std::env::var(k).ok()` in production.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be read or parsed.
    pub fn resolve<E>(
        explicit: Option<PathBuf>,
        config_file: Option<&Path>,
        env: E,
    ) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let mut config = match config_file {
            Some(file) if file.exists() => BchocConfig::from_file(file)?.ledger,
            _ => Self::default(),
        };

        if let Some(path) = env(LEDGER_PATH_ENV).filter(|p| !p.is_empty()) {
            config.path = PathBuf::from(path);
        }
        if let Some(path) = explicit {
            config.path = path;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::resolve(None, None, no_env).unwrap();
        assert_eq!(config.path, PathBuf::from("./bchoc"));
        assert!(config.fsync);
    }

    #[test]
    fn test_parse_toml() {
        let config = BchocConfig::from_toml(
            r#"
            [ledger]
            path = "/tmp/custody.bin"
            fsync = false
            "#,
        )
        .unwrap();
        assert_eq!(config.ledger.path, PathBuf::from("/tmp/custody.bin"));
        assert!(!config.ledger.fsync);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = BchocConfig::from_toml("").unwrap();
        assert_eq!(config.ledger, LedgerConfig::default());
    }

    #[test]
    fn test_rejects_unknown_keys_and_empty_path() {
        assert!(matches!(
            BchocConfig::from_toml("[ledger]\nlocation = \"x\"\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            BchocConfig::from_toml("[ledger]\npath = \"\"\n"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bchoc.toml");
        std::fs::write(&file, "[ledger]\npath = \"from-file\"\nfsync = false\n").unwrap();

        let from_file = LedgerConfig::resolve(None, Some(&file), no_env).unwrap();
        assert_eq!(from_file.path, PathBuf::from("from-file"));
        assert!(!from_file.fsync);

        let env = |key: &str| (key == LEDGER_PATH_ENV).then(|| "from-env".to_string());
        let from_env = LedgerConfig::resolve(None, Some(&file), env).unwrap();
        assert_eq!(from_env.path, PathBuf::from("from-env"));
        // Other file settings survive an env path override.
        assert!(!from_env.fsync);

        let explicit =
            LedgerConfig::resolve(Some(PathBuf::from("from-flag")), Some(&file), env).unwrap();
        assert_eq!(explicit.path, PathBuf::from("from-flag"));
    }

    #[test]
    fn test_missing_config_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            LedgerConfig::resolve(None, Some(&dir.path().join("absent.toml")), no_env).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }
}
