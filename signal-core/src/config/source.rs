//! Ingestion tunables: backoff, stale detection, refresh gating

use serde::{Deserialize, Serialize};

/// `delay = min(base * multiplier^attempt, max_delay)`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// Failed attempts before the source reports itself unavailable
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            multiplier: 1.5,
            max_delay_ms: 30_000,
            max_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub backoff: BackoffConfig,
    /// A push stream silent for this long is treated as dead
    pub stale_timeout_ms: u64,
    /// Quiet period collapsing bursts of manual refreshes
    pub refresh_debounce_ms: u64,
    /// Manual refreshes closer together than this are ignored
    pub refresh_throttle_ms: u64,
    /// Candles requested for the initial backfill
    pub backfill_limit: usize,
    /// Candles requested per poll or manual refresh
    pub poll_limit: usize,
    /// Switch to the simulated feed (flagged) once the primary is unavailable
    pub fallback_to_simulated: bool,
    pub channel_capacity: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            stale_timeout_ms: 60_000,
            refresh_debounce_ms: 400,
            refresh_throttle_ms: 2_000,
            backfill_limit: 500,
            poll_limit: 2,
            fallback_to_simulated: false,
            channel_capacity: 1_024,
        }
    }
}
