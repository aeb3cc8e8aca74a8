//! Pipeline configuration.
//!
//! Defaults come from `OBD_*` environment variables. A TOML file may override
//! them, and the daemon's command-line flags override the file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::enrich::EnrichPolicy;
use crate::error::ConfigError;

/// Upper bound on the oracle deadline.
pub const MAX_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 2_500;
const DEFAULT_MAX_CAUSES: usize = 5;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Reasoning oracle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Oracle endpoint URL; enrichment is disabled without one
    pub endpoint: Option<String>,
    /// Bearer token (optional)
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Deadline for the whole oracle call, retry included
    pub timeout_ms: u64,
    /// Retries on transient failure, 0 or 1
    pub retry: u8,
    /// AI enrichment switch
    pub enabled: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            endpoint: std::env::var("OBD_ORACLE_URL").ok().filter(|s| !s.is_empty()),
            token: std::env::var("OBD_ORACLE_TOKEN").ok().filter(|s| !s.is_empty()),
            timeout_ms: env_parse("OBD_ORACLE_TIMEOUT_MS", DEFAULT_ORACLE_TIMEOUT_MS),
            retry: env_parse("OBD_ORACLE_RETRY", 1),
            enabled: env_flag("OBD_AI_ENRICH_ENABLED", true),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Per-attempt request timeout, sized so every attempt fits the deadline.
    pub fn attempt_timeout(&self) -> Duration {
        let attempts = u64::from(self.retry.min(1)) + 1;
        Duration::from_millis((self.timeout_ms / attempts).max(1))
    }

    /// Whether an oracle should be contacted at all.
    pub fn is_active(&self) -> bool {
        self.enabled && self.endpoint.is_some()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// JSONL interaction log; records go to tracing when unset
    pub path: Option<PathBuf>,
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            path: std::env::var_os("OBD_LOG_PATH").map(PathBuf::from),
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset file replacing the built-in catalog
    pub catalog_path: Option<PathBuf>,
    /// Causes shown per reply
    pub max_causes: usize,
    pub oracle: OracleConfig,
    pub log: LogConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            catalog_path: std::env::var_os("OBD_CATALOG_PATH").map(PathBuf::from),
            max_causes: env_parse("OBD_MAX_CAUSES", DEFAULT_MAX_CAUSES),
            oracle: OracleConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Configuration from the environment only.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Parse TOML; absent keys keep their environment defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oracle.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "oracle.timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.oracle.timeout() > MAX_ORACLE_TIMEOUT {
            return Err(ConfigError::Invalid {
                field: "oracle.timeout_ms",
                reason: format!("must not exceed {} ms", MAX_ORACLE_TIMEOUT.as_millis()),
            });
        }
        if self.oracle.retry > 1 {
            return Err(ConfigError::Invalid {
                field: "oracle.retry",
                reason: "must be 0 or 1".into(),
            });
        }
        if self.max_causes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_causes",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    pub fn enrich_policy(&self) -> EnrichPolicy {
        EnrichPolicy {
            timeout: self.oracle.timeout(),
            retry_transient: self.oracle.retry > 0,
            max_causes: self.max_causes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base() -> PipelineConfig {
        PipelineConfig {
            catalog_path: None,
            max_causes: 5,
            oracle: OracleConfig {
                endpoint: None,
                token: None,
                timeout_ms: 2_500,
                retry: 1,
                enabled: true,
            },
            log: LogConfig {
                path: None,
                level: "info".into(),
                json: false,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = base();
        config.oracle.timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "oracle.timeout_ms", .. })
        ));
    }

    #[test]
    fn test_rejects_long_timeout() {
        let mut config = base();
        config.oracle.timeout_ms = 30_001;
        assert!(config.validate().is_err());
        config.oracle.timeout_ms = 30_000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_second_retry() {
        let mut config = base();
        config.oracle.retry = 2;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "oracle.retry", .. })
        ));
    }

    #[test]
    fn test_rejects_zero_max_causes() {
        let mut config = base();
        config.max_causes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_attempt_timeout_splits_deadline() {
        let mut config = base();
        assert_eq!(config.oracle.attempt_timeout(), Duration::from_millis(1_250));
        config.oracle.retry = 0;
        assert_eq!(config.oracle.attempt_timeout(), Duration::from_millis(2_500));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = base();
        config.oracle.retry = 0;
        config.max_causes = 3;
        let policy = config.enrich_policy();
        assert!(!policy.retry_transient);
        assert_eq!(policy.max_causes, 3);
        assert_eq!(policy.timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn test_toml_file_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_causes = 3\n\n[oracle]\nendpoint = \"http://localhost:8080/rank\"\ntimeout_ms = 1500\nretry = 0\n"
        )
        .unwrap();

        let config = PipelineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.max_causes, 3);
        assert_eq!(config.oracle.endpoint.as_deref(), Some("http://localhost:8080/rank"));
        assert_eq!(config.oracle.timeout_ms, 1_500);
        assert_eq!(config.oracle.retry, 0);
    }

    #[test]
    fn test_toml_invalid_value_rejected() {
        let err = PipelineConfig::from_toml_str("[oracle]\nretry = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_toml_file(Path::new("/nonexistent/obd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_inactive_without_endpoint() {
        let mut config = base();
        assert!(!config.oracle.is_active());
        config.oracle.endpoint = Some("http://localhost/rank".into());
        assert!(config.oracle.is_active());
        config.oracle.enabled = false;
        assert!(!config.oracle.is_active());
    }
}
