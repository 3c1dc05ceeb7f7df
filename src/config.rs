//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Wizard runtime configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Language used for prompts when a session has not chosen one.
    pub default_language: String,
    /// Sessions idle for longer than this are cleared.
    pub idle_timeout: Duration,
    /// How often the idle sweep runs.
    pub sweep_interval: Duration,
    /// Optional JSON catalog definition; the built-in listing catalog is
    /// used when unset.
    pub catalog_path: Option<PathBuf>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            idle_timeout: Duration::from_secs(1800), // 30 minutes
            sweep_interval: Duration::from_secs(60),
            catalog_path: None,
        }
    }
}

impl WizardConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_language = lookup("WIZARD_LANGUAGE")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.default_language);

        let idle_timeout = secs(&lookup, "WIZARD_IDLE_TIMEOUT_SECS")?.unwrap_or(defaults.idle_timeout);
        let sweep_interval =
            secs(&lookup, "WIZARD_SWEEP_INTERVAL_SECS")?.unwrap_or(defaults.sweep_interval);
        if sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "WIZARD_SWEEP_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let catalog_path = lookup("WIZARD_CATALOG_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            default_language,
            idle_timeout,
            sweep_interval,
            catalog_path,
        })
    }
}

fn secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(|n| Some(Duration::from_secs(n)))
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}' is not a number of seconds: {e}"),
        })
}
