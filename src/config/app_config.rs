use serde::Deserialize;

use crate::domain::verification::FailurePolicy;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Engine behavior and key material settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Server-side fingerprint secret. Rotating it invalidates every
    /// issued key; treat it like a database credential.
    pub secret: String,
    /// Prefix prepended to every generated raw key
    pub key_prefix: String,
    /// Rate limit applied to new keys that specify none
    pub default_rate_limit: u32,
    pub default_rate_limit_window_secs: u64,
    /// TTL of the fingerprint lookup cache
    pub cache_ttl_secs: u64,
    /// What to do when the counter store is unreachable mid-verification
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            secret: "insecure-dev-secret".to_string(),
            key_prefix: "sk_live_".to_string(),
            default_rate_limit: 1000,
            default_rate_limit_window_secs: 3600,
            cache_ttl_secs: 60,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("KEYGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.engine.key_prefix, "sk_live_");
        assert_eq!(config.engine.default_rate_limit, 1000);
        assert_eq!(config.engine.default_rate_limit_window_secs, 3600);
        assert_eq!(config.engine.failure_policy, FailurePolicy::FailClosed);
    }

    #[test]
    fn test_failure_policy_parses_from_snake_case() {
        let policy: FailurePolicy = serde_json::from_str("\"fail_open\"").unwrap();
        assert_eq!(policy, FailurePolicy::FailOpen);
    }
}
