use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Registry;
use crate::error::KiraError;
use crate::ncbi::{self, EntrezSettings};
use crate::quality::QualityWeights;

pub const DEFAULT_CONFIG_FILE: &str = "kira-dm.json";
pub const DEFAULT_MIN_QUALITY: f64 = 60.0;
pub const EMAIL_ENV: &str = "NCBI_EMAIL";
pub const API_KEY_ENV: &str = "NCBI_API_KEY";

/// Contents of `kira-dm.json`. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub rate_limit_seconds: Option<f64>,
    #[serde(default)]
    pub registries: Option<Vec<String>>,
    #[serde(default)]
    pub quality_weights: Option<QualityWeights>,
    #[serde(default)]
    pub min_quality: Option<f64>,
}

/// Values given on the command line; they win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub email: Option<String>,
    pub api_key: Option<String>,
    pub batch_size: Option<usize>,
    pub registries: Vec<Registry>,
    pub min_quality: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub email: Option<String>,
    pub api_key: Option<String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            email: std::env::var(EMAIL_ENV).ok(),
            api_key: std::env::var(API_KEY_ENV).ok(),
        }
    }
}

#[derive(Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub email: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub rate_limit: Duration,
    pub registries: Vec<Registry>,
    pub weights: QualityWeights,
    pub min_quality: f64,
}

impl ResolvedConfig {
    pub fn entrez_settings(&self) -> EntrezSettings {
        let mut settings = EntrezSettings::new(self.email.clone(), self.api_key.clone());
        settings.batch_size = self.batch_size;
        settings.rate_limit = self.rate_limit;
        settings
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("schema_version", &self.schema_version)
            .field("email", &self.email)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("batch_size", &self.batch_size)
            .field("rate_limit", &self.rate_limit)
            .field("registries", &self.registries)
            .field("weights", &self.weights)
            .field("min_quality", &self.min_quality)
            .finish()
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file (an explicit `path`, or `kira-dm.json` when it
    /// exists) and merges it with `overrides` and `env`.
    pub fn resolve(
        path: Option<&str>,
        overrides: &ConfigOverrides,
        env: &Environment,
    ) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| KiraError::ConfigParse(err.to_string()))?
        };

        Self::resolve_config(config, overrides, env)
    }

    pub fn resolve_config(
        config: Config,
        overrides: &ConfigOverrides,
        env: &Environment,
    ) -> Result<ResolvedConfig, KiraError> {
        let email = pick(&overrides.email, &config.email, &env.email)
            .ok_or_else(|| KiraError::MissingCredential(EMAIL_ENV.to_string()))?;
        if !email.contains('@') {
            return Err(KiraError::InvalidConfig {
                setting: "email".to_string(),
                message: format!("{email:?} is not an email address"),
            });
        }
        let api_key = pick(&overrides.api_key, &config.api_key, &env.api_key);

        let batch_size = overrides
            .batch_size
            .or(config.batch_size)
            .unwrap_or(ncbi::DEFAULT_BATCH_SIZE);
        if !(1..=ncbi::MAX_BATCH_SIZE).contains(&batch_size) {
            return Err(KiraError::InvalidConfig {
                setting: "batch_size".to_string(),
                message: format!(
                    "{batch_size} is outside 1..={}",
                    ncbi::MAX_BATCH_SIZE
                ),
            });
        }

        let rate_limit = match config.rate_limit_seconds {
            Some(seconds) if seconds.is_finite() && seconds >= 0.0 => {
                Duration::from_secs_f64(seconds)
            }
            Some(seconds) => {
                return Err(KiraError::InvalidConfig {
                    setting: "rate_limit_seconds".to_string(),
                    message: format!("{seconds} is not a non-negative number"),
                });
            }
            None if api_key.is_some() => ncbi::RATE_LIMIT_WITH_KEY,
            None => ncbi::RATE_LIMIT_WITHOUT_KEY,
        };

        let registries = if !overrides.registries.is_empty() {
            dedup(overrides.registries.clone())
        } else if let Some(names) = &config.registries {
            let parsed = names
                .iter()
                .map(|name| name.parse::<Registry>())
                .collect::<Result<Vec<_>, KiraError>>()?;
            dedup(parsed)
        } else {
            Registry::ALL.to_vec()
        };
        if registries.is_empty() {
            return Err(KiraError::InvalidConfig {
                setting: "registries".to_string(),
                message: "at least one registry is required".to_string(),
            });
        }

        let weights = config.quality_weights.unwrap_or_default();
        weights.validate()?;

        let min_quality = overrides
            .min_quality
            .or(config.min_quality)
            .unwrap_or(DEFAULT_MIN_QUALITY);
        if !(0.0..=100.0).contains(&min_quality) {
            return Err(KiraError::InvalidConfig {
                setting: "min_quality".to_string(),
                message: format!("{min_quality} is outside 0..=100"),
            });
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            email,
            api_key,
            batch_size,
            rate_limit,
            registries,
            weights,
            min_quality,
        })
    }
}

/// First non-blank value, trimmed.
fn pick(
    flag: &Option<String>,
    file: &Option<String>,
    env: &Option<String>,
) -> Option<String> {
    [flag, file, env]
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn dedup(registries: Vec<Registry>) -> Vec<Registry> {
    let mut seen = Vec::with_capacity(registries.len());
    for registry in registries {
        if !seen.contains(&registry) {
            seen.push(registry);
        }
    }
    seen
}
