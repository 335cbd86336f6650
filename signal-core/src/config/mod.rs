//! Configuration module
//!
//! Every threshold in the pipeline is a named, serde-loadable field with a
//! default; `PipelineConfig::validate` rejects values the stages cannot use.

pub mod alerts;
pub mod source;
pub mod stabilizer;

pub use alerts::*;
pub use source::*;
pub use stabilizer::*;

use crate::data::StoreConfig;
use crate::error::ConfigError;
use crate::indicators::IndicatorConfig;
use crate::strategy::{RegimeConfig, SynthesizerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub store: StoreConfig,
    pub indicators: IndicatorConfig,
    pub synthesizer: SynthesizerConfig,
    pub regime: RegimeConfig,
    pub stabilizer: StabilizerConfig,
    pub alerts: AlertConfig,
    pub source: SourceConfig,
}

fn check(ok: bool, message: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Validation(message.to_string()))
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON document; missing fields take defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ind = &self.indicators;
        check(self.store.capacity > 0, "store.capacity must be positive")?;
        check(
            self.store.significance_epsilon >= 0.0,
            "store.significance_epsilon must not be negative",
        )?;
        check(
            [ind.sma_period, ind.ema_period, ind.rsi_period, ind.macd_fast, ind.macd_slow,
             ind.macd_signal, ind.bb_period, ind.atr_period]
                .iter()
                .all(|p| *p > 0),
            "indicator periods must be positive",
        )?;
        check(ind.macd_fast < ind.macd_slow, "macd_fast must be shorter than macd_slow")?;
        check(
            (0.0..=1.0).contains(&ind.levels.cluster_tolerance),
            "levels.cluster_tolerance must be within [0, 1]",
        )?;

        let sy = &self.synthesizer;
        check(
            (0.0..=100.0).contains(&sy.neutral_floor),
            "synthesizer.neutral_floor must be within [0, 100]",
        )?;
        check(
            sy.rsi_oversold < sy.rsi_soft_low && sy.rsi_soft_high < sy.rsi_overbought,
            "synthesizer RSI zones must nest inside the oversold/overbought bounds",
        )?;

        let st = &self.stabilizer;
        check(
            (0.0..=100.0).contains(&st.high_confidence)
                && (0.0..=100.0).contains(&st.hold_confidence_cap),
            "stabilizer confidences must be within [0, 100]",
        )?;
        check(st.signal_history_len > 0, "stabilizer.signal_history_len must be positive")?;
        check(st.confidence_history_len > 0, "stabilizer.confidence_history_len must be positive")?;

        let al = &self.alerts;
        check(
            (0.0..=100.0).contains(&al.confidence_threshold),
            "alerts.confidence_threshold must be within [0, 100]",
        )?;
        check((0.0..=1.0).contains(&al.alert_volume), "alerts.alert_volume must be within [0, 1]")?;

        let bo = &self.source.backoff;
        check(bo.multiplier >= 1.0, "backoff.multiplier must be at least 1")?;
        check(bo.base_delay_ms <= bo.max_delay_ms, "backoff base delay exceeds the cap")?;
        check(self.source.channel_capacity > 0, "source.channel_capacity must be positive")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = PipelineConfig::from_json_str(
            r#"{ "stabilizer": { "base_lock_ms": 120000 }, "alerts": { "confidence_threshold": 55 } }"#,
        )
        .unwrap();
        assert_eq!(config.stabilizer.base_lock_ms, 120_000);
        assert_eq!(config.stabilizer.high_confidence, 65.0);
        assert_eq!(config.alerts.confidence_threshold, 55.0);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = PipelineConfig::from_json_str(r#"{ "alerts": { "alert_volume": 3.0 } }"#);
        assert!(matches!(err, Err(ConfigError::Validation(_))));
        let err = PipelineConfig::from_json_str(r#"{ "indicators": { "macd_fast": 30 } }"#);
        assert!(matches!(err, Err(ConfigError::Validation(_))));
        assert!(matches!(PipelineConfig::from_json_str("{"), Err(ConfigError::Json(_))));
    }
}
