//! Signal stabilizer tunables
//!
//! The defaults are empirically tuned values. Only the shape of the policy
//! is fixed: a consistency gate, lock-period hysteresis, regime-adaptive
//! strictness and a streak override.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Minimum dwell before a direction flip, before regime scaling
    pub base_lock_ms: u64,

    /// Confidence that bypasses the history consistency check
    pub high_confidence: f64,
    /// Most recent history entries inspected by the consistency check
    pub consistency_lookback: usize,
    /// Maximum age of a history entry considered by the consistency check
    pub consistency_window_ms: u64,
    /// Default bar: at least this many same-type entries...
    pub min_same_signals: usize,
    /// ...and at most this many opposite-type entries
    pub max_opposite_signals: usize,
    /// Relaxed bar in a strong trend aligned with the signal
    pub trending_min_same: usize,
    pub trending_max_opposite: usize,
    /// Relaxed bar when accumulation/distribution favours the signal
    pub accumulation_min_same: usize,
    pub accumulation_max_opposite: usize,

    /// Trend strength above which a TRENDING regime counts as strong
    pub strong_trend_strength: f64,
    /// Regime volatility above which the lock is lengthened
    pub high_volatility: f64,
    pub high_volatility_lock_factor: f64,
    pub trending_lock_factor: f64,
    /// Lock shortening for high-conviction signals
    pub conviction_lock_factor: f64,
    pub conviction_confidence: f64,
    pub conviction_streak: u32,

    /// Hold when confidence < ratio * rolling average AND below the floor
    pub low_confidence_ratio: f64,
    pub low_confidence_floor: f64,

    /// Reversal lock = effective lock * factor (VOLATILE uses its own factor)
    pub reversal_lock_factor: f64,
    pub reversal_lock_factor_volatile: f64,

    /// Sustained reversal that overrides every hold condition
    pub reversal_override_streak: u32,
    pub reversal_override_confidence: f64,

    /// Upper bound on the confidence of an emitted HOLD
    pub hold_confidence_cap: f64,
    /// Rolling window of raw BUY/SELL confidences
    pub confidence_history_len: usize,
    /// Post-stabilization history ring
    pub signal_history_len: usize,
    /// Minimum wall-clock gap between regime recomputations
    pub regime_refresh_ms: u64,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            base_lock_ms: 60_000,
            high_confidence: 65.0,
            consistency_lookback: 4,
            consistency_window_ms: 90_000,
            min_same_signals: 2,
            max_opposite_signals: 1,
            trending_min_same: 1,
            trending_max_opposite: 0,
            accumulation_min_same: 1,
            accumulation_max_opposite: 1,
            strong_trend_strength: 70.0,
            high_volatility: 80.0,
            high_volatility_lock_factor: 1.5,
            trending_lock_factor: 0.7,
            conviction_lock_factor: 0.7,
            conviction_confidence: 75.0,
            conviction_streak: 3,
            low_confidence_ratio: 0.85,
            low_confidence_floor: 45.0,
            reversal_lock_factor: 1.2,
            reversal_lock_factor_volatile: 1.0,
            reversal_override_streak: 3,
            reversal_override_confidence: 65.0,
            hold_confidence_cap: 70.0,
            confidence_history_len: 10,
            signal_history_len: 20,
            regime_refresh_ms: 30_000,
        }
    }
}
