use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cache: CacheConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub predict: PredictConfig,
    pub collections: Vec<CollectionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay", deserialize_with = "de_duration")]
    pub retry_delay: Duration,
    #[serde(default = "default_request_timeout", deserialize_with = "de_duration")]
    pub request_timeout: Duration,
}

fn default_base_url() -> String {
    "https://celestrak.org/NORAD/elements/gp.php".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_tick_period", deserialize_with = "de_duration")]
    pub tick_period: Duration,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_tick_period() -> Duration {
    Duration::from_secs(1)
}

fn default_channel_capacity() -> usize {
    100
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            tick_period: default_tick_period(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictConfig {
    #[serde(default = "default_min_elevation")]
    pub min_elevation_deg: f64,
    #[serde(default = "default_sample_step", deserialize_with = "de_duration")]
    pub sample_step: Duration,
}

fn default_min_elevation() -> f64 {
    10.0
}

fn default_sample_step() -> Duration {
    Duration::from_secs(60)
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            min_elevation_deg: default_min_elevation(),
            sample_step: default_sample_step(),
        }
    }
}

/// One named upstream group of element sets, with its own staleness bound.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    /// Upstream group query; a collection without one is local-only.
    pub group: Option<String>,
    #[serde(default = "default_staleness", deserialize_with = "de_duration")]
    pub staleness: Duration,
}

fn default_staleness() -> Duration {
    Duration::from_secs(3600)
}

/// Accepts `"90s"`, `"1h 30m"` and friends.
fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let yaml = r#"
cache:
  dir: /var/lib/satwatch
collections:
  - name: stations
    group: stations
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.fetch.base_url, default_base_url());
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.hub.tick_period, Duration::from_secs(1));
        assert_eq!(config.hub.channel_capacity, 100);
        assert_eq!(config.predict.min_elevation_deg, 10.0);
        assert_eq!(config.collections.len(), 1);
        assert_eq!(config.collections[0].staleness, Duration::from_secs(3600));
    }

    #[test]
    fn durations_parse_from_humantime_strings() {
        let yaml = r#"
cache:
  dir: /tmp/cache
fetch:
  retry_delay: 90s
  request_timeout: 1m 30s
hub:
  tick_period: 250ms
collections:
  - name: weather
    group: weather
    staleness: 2h
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.fetch.retry_delay, Duration::from_secs(90));
        assert_eq!(config.fetch.request_timeout, Duration::from_secs(90));
        assert_eq!(config.hub.tick_period, Duration::from_millis(250));
        assert_eq!(config.collections[0].staleness, Duration::from_secs(7200));
    }

    #[test]
    fn bad_duration_is_a_yaml_error() {
        let yaml = r#"
cache:
  dir: /tmp/cache
hub:
  tick_period: soonish
collections: []
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn local_only_collections_have_no_group() {
        let yaml = r#"
cache:
  dir: /tmp/cache
collections:
  - name: adhoc
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.collections[0].group.is_none());
    }
}
