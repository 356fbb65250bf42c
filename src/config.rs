//! Client configuration
//!
//! Resolution order: built-in defaults, then an optional JSON file, then the
//! `DUMPLING_URL` / `DUMPLING_MAX_THREADS` environment variables. The CLI applies
//! its own flags last.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVICE_URL: &str = "https://dumpling-dev.azurewebsites.net/";

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

const MAX_COMPRESSION_LEVEL: u32 = 9;

const ENV_SERVICE_URL: &str = "DUMPLING_URL";
const ENV_MAX_THREADS: &str = "DUMPLING_MAX_THREADS";

/// What directory expansion does with a path that is neither a file nor a directory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MissingPathPolicy {
    #[default]
    #[serde(rename = "skip")]
    Skip,
    #[serde(rename = "error")]
    Error,
}

impl std::fmt::Display for MissingPathPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingPathPolicy::Skip => write!(f, "skip"),
            MissingPathPolicy::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub service_url: String,
    /// Upper bound on concurrent transfer workers; 1 runs every transfer inline
    pub max_threads: usize,
    pub compression_level: u32,
    pub missing_paths: MissingPathPolicy,
    /// Where compressed temp files go; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            max_threads: num_cpus::get(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            missing_paths: MissingPathPolicy::default(),
            temp_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file; keys that are absent keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, optionally overlaid by a file, then by the environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides through `lookup` so tests need not touch the
    /// process environment.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_SERVICE_URL) {
            self.service_url = url;
        }
        if let Some(threads) = lookup(ENV_MAX_THREADS) {
            self.max_threads = threads.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} must be a number, got '{}'", ENV_MAX_THREADS, threads))
            })?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::Invalid("max_threads must be at least 1".to_string()));
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(ConfigError::Invalid(format!(
                "compression_level must be between 0 and {}, got {}",
                MAX_COMPRESSION_LEVEL, self.compression_level
            )));
        }
        let url = self.service_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("service_url is required".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "service_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.service_url, DEFAULT_SERVICE_URL);
        assert!(config.max_threads >= 1);
        assert_eq!(config.missing_paths, MissingPathPolicy::Skip);
        config.validate().unwrap();
    }

    #[test]
    fn file_values_override_defaults_and_missing_keys_keep_them() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"service_url": "http://localhost:8080/", "max_threads": 3, "missing_paths": "error"}}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.service_url, "http://localhost:8080/");
        assert_eq!(config.max_threads, 3);
        assert_eq!(config.missing_paths, MissingPathPolicy::Error);
        assert_eq!(config.compression_level, DEFAULT_COMPRESSION_LEVEL);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ClientConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let config = ClientConfig::default()
            .apply_env(|key| match key {
                "DUMPLING_URL" => Some("http://dumps.internal/".to_string()),
                "DUMPLING_MAX_THREADS" => Some(" 2 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.service_url, "http://dumps.internal/");
        assert_eq!(config.max_threads, 2);
    }

    #[test]
    fn bad_thread_count_in_env_is_rejected() {
        let err = ClientConfig::default()
            .apply_env(|key| (key == "DUMPLING_MAX_THREADS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let zero_threads = ClientConfig {
            max_threads: 0,
            ..ClientConfig::default()
        };
        assert!(zero_threads.validate().is_err());

        let bad_level = ClientConfig {
            compression_level: 12,
            ..ClientConfig::default()
        };
        assert!(bad_level.validate().is_err());

        let bad_url = ClientConfig {
            service_url: "ftp://example.com".to_string(),
            ..ClientConfig::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn missing_path_policy_display_matches_serde_names() {
        assert_eq!(MissingPathPolicy::Skip.to_string(), "skip");
        assert_eq!(MissingPathPolicy::Error.to_string(), "error");
    }
}
