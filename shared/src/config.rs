use anyhow::Context;
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Alert settings taken from the environment; unset values keep the
/// pipeline configuration's own
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertOverrides {
    pub confidence_threshold: Option<f64>,
    pub alerts_enabled: Option<bool>,
    pub alert_volume: Option<f64>,
    pub notifications_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub symbol: String,
    pub interval: String,
    pub data_source: String,
    pub pipeline_config: Option<String>,
    pub log_level: String,
    pub log_json: bool,
    pub alerts: AlertOverrides,
}

fn optional<T>(key: &str) -> Result<Option<T>, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(None),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        let config = Config {
            symbol: std::env::var("SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string()),
            interval: std::env::var("INTERVAL").unwrap_or_else(|_| "1m".to_string()),
            data_source: std::env::var("DATA_SOURCE").unwrap_or_else(|_| "simulated".to_string()),
            pipeline_config: std::env::var("PIPELINE_CONFIG").ok().filter(|p| !p.is_empty()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: optional("LOG_JSON")?.unwrap_or(false),
            alerts: AlertOverrides {
                confidence_threshold: optional("CONFIDENCE_THRESHOLD")?,
                alerts_enabled: optional("ALERTS_ENABLED")?,
                alert_volume: optional("ALERT_VOLUME")?,
                notifications_enabled: optional("NOTIFICATIONS_ENABLED")?,
            },
        };
        tracing::debug!(?config, "Loaded environment configuration");
        Ok(config)
    }
}
