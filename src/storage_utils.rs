use crate::errors::ConfigError;
use secrecy::SecretString;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

pub const API_KEY_ENV: &str = "CRYPTOCOMPARE_API_KEY";

// CONFIGURATION STRUCTS
// Every field has a default, so `config.json` only needs the keys it overrides.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub from_symbol: String, // e.g., "BTC"
    pub to_symbol: String,   // e.g., "USD"
    pub limit: u32,          // provider maximum is 2000 points per call
    pub lookback_days: i64,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://min-api.cryptocompare.com/data/v2/histohour".to_string(),
            from_symbol: "BTC".to_string(),
            to_symbol: "USD".to_string(),
            limit: 2000,
            lookback_days: 4 * 365,
            timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 1_000,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub sma_period: usize,        // trailing window, in hourly points
    pub performance_window_days: i64,
    pub bucket_days: i64,         // length of one "year" in the breakdown
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            sma_period: 50,
            performance_window_days: 365,
            bucket_days: 365,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub strategy: StrategyConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.limit == 0 || self.fetch.limit > 2000 {
            return Err(ConfigError::Invalid {
                field: "fetch.limit",
                reason: format!("{} is outside 1..=2000", self.fetch.limit),
            });
        }
        if self.fetch.lookback_days <= 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.lookback_days",
                reason: "must be positive".to_string(),
            });
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.max_attempts",
                reason: "at least one attempt is required".to_string(),
            });
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch.timeout_secs",
                reason: "a zero timeout fails every request".to_string(),
            });
        }
        if self.strategy.sma_period == 0 {
            return Err(ConfigError::Invalid {
                field: "strategy.sma_period",
                reason: "must be positive".to_string(),
            });
        }
        if self.strategy.bucket_days <= 0 || self.strategy.performance_window_days <= 0 {
            return Err(ConfigError::Invalid {
                field: "strategy",
                reason: "day counts must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Reads an environment variable, returning a structured error if it's missing.
pub fn get_env_var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// The CryptoCompare key, kept out of `Debug` output and logs.
pub fn api_key_from_env() -> Result<SecretString, ConfigError> {
    Ok(SecretString::new(get_env_var(API_KEY_ENV)?.into()))
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path to the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Resolves `relative_path` against the directory of the running executable
    /// and creates it if needed.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }

        Ok(Self { base_dir })
    }

    /// Reads `<filename>.json` and deserializes it into `T`.
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));

        // serde_json validates the bytes itself, no need for read_to_string.
        let content = fs::read(path).await?;

        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Like [`load`](Self::load), but a missing file yields `T::default()`.
    pub async fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        filename: &str,
    ) -> anyhow::Result<T> {
        match self.load(filename).await {
            Ok(data) => Ok(data),
            Err(e) => match e.downcast_ref::<std::io::Error>() {
                Some(io) if io.kind() == ErrorKind::NotFound => {
                    debug!(filename, "no file in storage, using defaults");
                    Ok(T::default())
                }
                _ => Err(e),
            },
        }
    }
}

/// Loads `storage/config.json` (if present) and validates it.
pub async fn load_config(storage: &AsyncStorageManager) -> anyhow::Result<AppConfig> {
    let config: AppConfig = storage.load_or_default("config").await?;
    config.validate()?;
    info!(
        pair = %format!("{}/{}", config.fetch.from_symbol, config.fetch.to_symbol),
        lookback_days = config.fetch.lookback_days,
        sma_period = config.strategy.sma_period,
        "configuration loaded"
    );
    Ok(config)
}
