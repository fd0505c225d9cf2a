use crate::brunata::{Credentials, ProviderEndpoints};
use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::model::{MetricMapping, TieBreak};
use serde_derive::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn log_level(&self) -> tracing::Level {
        tracing::Level::from_str(self.log_level.as_str()).unwrap_or(tracing::Level::INFO)
    }
}

pub(crate) fn load_app_config() -> Result<AppConfig, ConfigError> {
    envy::from_env::<AppConfig>().map_err(ConfigError::env_parse)
}

fn default_base_url() -> String {
    "https://online.brunata.com".to_string()
}

fn default_auth_url() -> String {
    "https://brunatab2cprod.b2clogin.com/brunatab2cprod.onmicrosoft.com".to_string()
}

fn default_policy() -> String {
    "B2C_1_signin_username".to_string()
}

fn default_client_id() -> String {
    "e1d10965-78dc-4051-a1e5-251483e74d03".to_string()
}

fn default_request_timeout_sec() -> u64 {
    15
}

#[derive(Deserialize)]
pub struct BrunataConfig {
    pub username: String,
    pub password: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,
    // e.g. "water_usage=Water,electricity_usage=Other"
    pub metrics: Option<String>,
    // first | latest | sum | meter:<id>
    pub tie_break: Option<String>,
}

impl BrunataConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.as_str(), self.password.as_str())
    }

    pub fn endpoints(&self) -> Result<ProviderEndpoints, ConfigError> {
        ProviderEndpoints::new(
            &self.base_url,
            &self.auth_url,
            self.policy.as_str(),
            self.client_id.as_str(),
        )
        .map_err(|e| ConfigError::invalid("BRUNATA_BASE_URL/BRUNATA_AUTH_URL", e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_sec)
    }

    pub fn metric_mapping(&self) -> Result<MetricMapping, ConfigError> {
        match &self.metrics {
            Some(metrics) => metrics
                .parse()
                .map_err(|e: String| ConfigError::invalid("BRUNATA_METRICS", e)),
            None => Ok(MetricMapping::default()),
        }
    }

    pub fn tie_break(&self) -> Result<TieBreak, ConfigError> {
        match &self.tie_break {
            Some(tie_break) => tie_break
                .parse()
                .map_err(|e: String| ConfigError::invalid("BRUNATA_TIE_BREAK", e)),
            None => Ok(TieBreak::default()),
        }
    }
}

impl fmt::Debug for BrunataConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrunataConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("auth_url", &self.auth_url)
            .field("policy", &self.policy)
            .field("client_id", &self.client_id)
            .field("request_timeout_sec", &self.request_timeout_sec)
            .field("metrics", &self.metrics)
            .field("tie_break", &self.tie_break)
            .finish()
    }
}

pub(crate) fn load_brunata_config() -> Result<BrunataConfig, ConfigError> {
    let config = envy::prefixed("BRUNATA_")
        .from_env::<BrunataConfig>()
        .map_err(ConfigError::env_parse)?;
    if config.request_timeout_sec == 0 {
        return Err(ConfigError::invalid(
            "BRUNATA_REQUEST_TIMEOUT_SEC",
            "must be greater than zero",
        ));
    }
    Ok(config)
}

fn default_interval_sec() -> u64 {
    1800
}

fn default_cycle_timeout_sec() -> u64 {
    120
}

#[derive(Deserialize, Debug)]
pub struct CollectorConfig {
    #[serde(default = "default_interval_sec")]
    pub interval_sec: u64,
    // upper bound for one whole refresh cycle, handshake included
    #[serde(default = "default_cycle_timeout_sec")]
    pub cycle_timeout_sec: u64,
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_sec)
    }
}

pub fn load_collector_config() -> Result<CollectorConfig, ConfigError> {
    let config = envy::prefixed("COLLECTOR_")
        .from_env::<CollectorConfig>()
        .map_err(ConfigError::env_parse)?;
    if config.interval_sec == 0 {
        return Err(ConfigError::invalid(
            "COLLECTOR_INTERVAL_SEC",
            "must be greater than zero",
        ));
    }
    if config.cycle_timeout_sec == 0 {
        return Err(ConfigError::invalid(
            "COLLECTOR_CYCLE_TIMEOUT_SEC",
            "must be greater than zero",
        ));
    }
    Ok(config)
}

pub fn load_circuit_breaker_config() -> Result<CircuitBreakerConfig, ConfigError> {
    envy::prefixed("CIRCUIT_BREAKER_")
        .from_env::<CircuitBreakerConfig>()
        .map_err(ConfigError::env_parse)
}

#[derive(Deserialize, Debug)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}

/// `None` when `INFLUXDB_URL` is unset; snapshots are then only logged.
pub fn load_influx_config() -> Result<Option<InfluxConfig>, ConfigError> {
    if std::env::var_os("INFLUXDB_URL").is_none() {
        return Ok(None);
    }
    envy::prefixed("INFLUXDB_")
        .from_env::<InfluxConfig>()
        .map(Some)
        .map_err(ConfigError::env_parse)
}
