//! Hysteresis over the raw signal stream.
//!
//! A raw BUY/SELL only becomes actionable when it is consistent with recent
//! history and does not flip the last actionable direction inside the
//! regime-scaled lock period. A sustained, confident reversal overrides the
//! lock.

use crate::config::StabilizerConfig;
use crate::data::Candle;
use crate::strategy::{
    MarketRegime, MarketRegimeDetector, RegimeKind, Signal, SignalHistoryEntry, SignalType,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

/// Why a raw signal was turned into HOLD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldReason {
    NeutralInput,
    PassThrough,
    Inconsistent,
    ReversalTooSoon,
    LowConfidence,
    LockActive,
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NeutralInput => "indicators neutral",
            Self::PassThrough => "hold proposed upstream",
            Self::Inconsistent => "not confirmed by recent history",
            Self::ReversalTooSoon => "reversal within half the lock period",
            Self::LowConfidence => "confidence well below recent average",
            Self::LockActive => "reversal lock still active",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerDecision {
    pub signal: Signal,
    pub hold_reason: Option<HoldReason>,
    pub regime: MarketRegime,
}

impl StabilizerDecision {
    pub fn is_actionable(&self) -> bool {
        self.signal.signal_type.is_actionable()
    }
}

/// Per-session stabilizer memory
#[derive(Debug, Clone, Default)]
pub struct StabilizerState {
    pub last_actionable_signal: Option<SignalType>,
    pub last_actionable_time: Option<DateTime<Utc>>,
    /// Effective lock computed on the latest BUY/SELL evaluation
    pub lock_period_ms: u64,
    pub confidence_history: VecDeque<f64>,
    pub consecutive_same_signals: u32,
    pub opposite_signal_streak: u32,
    pub hold_count: u32,
    pub regime_cache: Option<MarketRegime>,
    pub last_regime_check_time: Option<DateTime<Utc>>,
    pub history: VecDeque<SignalHistoryEntry>,
}

impl StabilizerState {
    pub fn rolling_avg_confidence(&self) -> Option<f64> {
        if self.confidence_history.is_empty() {
            return None;
        }
        let sum: f64 = self.confidence_history.iter().sum();
        Some(sum / self.confidence_history.len() as f64)
    }
}

fn millis(ms: f64) -> Duration {
    Duration::milliseconds(ms.round() as i64)
}

pub struct SignalStabilizer {
    config: StabilizerConfig,
    detector: MarketRegimeDetector,
    state: StabilizerState,
}

impl SignalStabilizer {
    pub fn new(config: StabilizerConfig, detector: MarketRegimeDetector) -> Self {
        Self {
            config,
            detector,
            state: StabilizerState::default(),
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn state(&self) -> &StabilizerState {
        &self.state
    }

    pub fn history(&self) -> impl Iterator<Item = &SignalHistoryEntry> {
        self.state.history.iter()
    }

    pub fn reset(&mut self) {
        self.state = StabilizerState::default();
    }

    /// Cached regime, reclassified at most once per refresh interval of
    /// wall-clock time
    pub fn regime(&mut self, candles: &[Candle], now: DateTime<Utc>) -> MarketRegime {
        let refresh = Duration::milliseconds(self.config.regime_refresh_ms as i64);
        let due = match (self.state.regime_cache, self.state.last_regime_check_time) {
            (Some(_), Some(checked)) => now - checked >= refresh,
            _ => true,
        };
        if due {
            let regime = self.detector.classify(candles);
            debug!(kind = ?regime.kind, strength = regime.strength, volatility = regime.volatility, "Regime refreshed");
            self.state.regime_cache = Some(regime);
            self.state.last_regime_check_time = Some(now);
        }
        self.state.regime_cache.unwrap_or_default()
    }

    /// Full tick: refresh the regime from `candles`, then stabilize `raw`
    pub fn process(&mut self, raw: &Signal, candles: &[Candle], now: DateTime<Utc>) -> StabilizerDecision {
        let regime = self.regime(candles, now);
        self.stabilize(raw, regime, now)
    }

    /// Stabilize `raw` against an explicit regime
    pub fn stabilize(&mut self, raw: &Signal, regime: MarketRegime, now: DateTime<Utc>) -> StabilizerDecision {
        let cap = self.config.hold_confidence_cap;
        let (signal, hold_reason) = match raw.signal_type {
            SignalType::Neutral => {
                self.state.hold_count += 1;
                (raw.clone().into_hold(cap), Some(HoldReason::NeutralInput))
            }
            SignalType::Hold => {
                self.state.hold_count += 1;
                (raw.clone(), Some(HoldReason::PassThrough))
            }
            SignalType::Buy | SignalType::Sell => {
                let reason = self.evaluate(raw, &regime, now);
                self.push_confidence(raw.confidence);
                match reason {
                    Some(reason) => {
                        self.state.hold_count += 1;
                        debug!(
                            raw = %raw.signal_type,
                            confidence = raw.confidence,
                            reason = %reason,
                            hold_count = self.state.hold_count,
                            "Holding raw signal"
                        );
                        (raw.clone().into_hold(cap), Some(reason))
                    }
                    None => {
                        self.accept(raw.signal_type, now);
                        info!(
                            signal = %raw.signal_type,
                            confidence = raw.confidence,
                            regime = ?regime.kind,
                            "Actionable signal"
                        );
                        (raw.clone(), None)
                    }
                }
            }
        };

        self.record(SignalHistoryEntry {
            signal_type: signal.signal_type,
            raw_type: raw.signal_type,
            time: now,
            confidence: signal.confidence,
        });
        StabilizerDecision {
            signal,
            hold_reason,
            regime,
        }
    }

    /// `None` when the raw BUY/SELL should be emitted
    fn evaluate(&mut self, raw: &Signal, regime: &MarketRegime, now: DateTime<Utc>) -> Option<HoldReason> {
        let c = &self.config;
        let direction = raw.signal_type;
        let confidence = raw.confidence;

        let reversal = self
            .state
            .last_actionable_signal
            .map_or(false, |last| direction.is_opposite_of(last));
        if reversal {
            self.state.opposite_signal_streak += 1;
        } else {
            self.state.opposite_signal_streak = 0;
        }

        let mut lock_ms = c.base_lock_ms as f64;
        if regime.volatility > c.high_volatility {
            lock_ms *= c.high_volatility_lock_factor;
        }
        if regime.is_strong_trend(c.strong_trend_strength) {
            lock_ms *= c.trending_lock_factor;
        }
        if confidence > c.conviction_confidence
            || self.state.consecutive_same_signals >= c.conviction_streak
        {
            lock_ms *= c.conviction_lock_factor;
        }
        self.state.lock_period_ms = lock_ms.round() as u64;

        if reversal
            && self.state.opposite_signal_streak >= c.reversal_override_streak
            && confidence > c.reversal_override_confidence
        {
            debug!(
                streak = self.state.opposite_signal_streak,
                confidence,
                "Sustained reversal overrides lock"
            );
            return None;
        }

        if !self.is_consistent(direction, confidence, regime, now) {
            return Some(HoldReason::Inconsistent);
        }

        if reversal {
            if let Some(since) = self.state.last_actionable_time.map(|t| now - t) {
                if since < millis(lock_ms / 2.0) {
                    return Some(HoldReason::ReversalTooSoon);
                }
                let factor = if regime.kind == RegimeKind::Volatile {
                    c.reversal_lock_factor_volatile
                } else {
                    c.reversal_lock_factor
                };
                if since < millis(lock_ms * factor) {
                    return Some(HoldReason::LockActive);
                }
            }
        }

        if let Some(avg) = self.state.rolling_avg_confidence() {
            if confidence < c.low_confidence_ratio * avg && confidence < c.low_confidence_floor {
                return Some(HoldReason::LowConfidence);
            }
        }

        None
    }

    fn is_consistent(
        &self,
        direction: SignalType,
        confidence: f64,
        regime: &MarketRegime,
        now: DateTime<Utc>,
    ) -> bool {
        let c = &self.config;
        if confidence >= c.high_confidence {
            return true;
        }

        let (min_same, max_opposite) =
            if regime.is_strong_trend(c.strong_trend_strength) && regime.aligned_with(direction) {
                (c.trending_min_same, c.trending_max_opposite)
            } else if regime.favors(direction) {
                (c.accumulation_min_same, c.accumulation_max_opposite)
            } else {
                (c.min_same_signals, c.max_opposite_signals)
            };

        // Only emitted entries confirm; held observations count as HOLD
        let window = Duration::milliseconds(c.consistency_window_ms as i64);
        let recent = self
            .state
            .history
            .iter()
            .rev()
            .take(c.consistency_lookback)
            .filter(|entry| now - entry.time <= window);
        let (mut same, mut opposite) = (0, 0);
        for entry in recent {
            if entry.signal_type == direction {
                same += 1;
            } else if entry.signal_type.is_opposite_of(direction) {
                opposite += 1;
            }
        }
        same >= min_same && opposite <= max_opposite
    }

    /// A reversal restarts the same-direction run at 1 and zeroes the streak;
    /// the streak counts raw reversals against the last emitted direction.
    fn accept(&mut self, direction: SignalType, now: DateTime<Utc>) {
        let state = &mut self.state;
        if state.last_actionable_signal == Some(direction) {
            state.consecutive_same_signals += 1;
        } else {
            state.consecutive_same_signals = 1;
        }
        state.opposite_signal_streak = 0;
        state.hold_count = 0;
        state.last_actionable_signal = Some(direction);
        state.last_actionable_time = Some(now);
    }

    fn push_confidence(&mut self, confidence: f64) {
        let len = self.config.confidence_history_len.max(1);
        let history = &mut self.state.confidence_history;
        history.push_back(confidence);
        while history.len() > len {
            history.pop_front();
        }
    }

    fn record(&mut self, entry: SignalHistoryEntry) {
        let len = self.config.signal_history_len.max(1);
        let history = &mut self.state.history;
        history.push_back(entry);
        while history.len() > len {
            history.pop_front();
        }
    }
}

impl Default for SignalStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default(), MarketRegimeDetector::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::TrendDirection;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(s: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(s)
    }

    fn raw(signal_type: SignalType, confidence: f64, at: DateTime<Utc>) -> Signal {
        Signal::new(signal_type, confidence, at)
    }

    fn run(stabilizer: &mut SignalStabilizer, signal_type: SignalType, confidence: f64, at: i64) -> StabilizerDecision {
        stabilizer.stabilize(&raw(signal_type, confidence, secs(at)), MarketRegime::undefined(), secs(at))
    }

    #[test]
    fn test_neutral_becomes_hold() {
        let mut s = SignalStabilizer::default();
        let d = run(&mut s, SignalType::Neutral, 20.0, 0);
        assert_eq!(d.signal.signal_type, SignalType::Hold);
        assert_eq!(d.hold_reason, Some(HoldReason::NeutralInput));
        assert_eq!(s.state().hold_count, 1);
    }

    #[test]
    fn test_hold_passes_through_and_caps_nothing() {
        let mut s = SignalStabilizer::default();
        let d = run(&mut s, SignalType::Hold, 90.0, 0);
        assert_eq!(d.signal.signal_type, SignalType::Hold);
        assert_eq!(d.signal.confidence, 90.0);
        assert_eq!(s.state().hold_count, 1);
    }

    #[test]
    fn test_quick_reversal_is_held() {
        let mut s = SignalStabilizer::default();
        assert_eq!(run(&mut s, SignalType::Buy, 80.0, 0).signal.signal_type, SignalType::Buy);
        let d = run(&mut s, SignalType::Sell, 70.0, 10);
        assert_eq!(d.signal.signal_type, SignalType::Hold);
        assert_eq!(d.hold_reason, Some(HoldReason::ReversalTooSoon));
        assert!(d.signal.confidence <= 70.0);
        assert_eq!(s.state().last_actionable_signal, Some(SignalType::Buy));
    }

    #[test]
    fn test_confident_repeats_bypass_consistency() {
        let mut s = SignalStabilizer::default();
        for i in 0..3 {
            let d = run(&mut s, SignalType::Buy, 66.0, i * 5);
            assert_eq!(d.signal.signal_type, SignalType::Buy, "emission {}", i + 1);
        }
        assert_eq!(s.state().consecutive_same_signals, 3);
    }

    #[test]
    fn test_sustained_reversal_overrides_lock() {
        let mut s = SignalStabilizer::default();
        run(&mut s, SignalType::Buy, 80.0, 0);
        assert_eq!(run(&mut s, SignalType::Sell, 70.0, 5).signal.signal_type, SignalType::Hold);
        assert_eq!(run(&mut s, SignalType::Sell, 70.0, 10).signal.signal_type, SignalType::Hold);
        let d = run(&mut s, SignalType::Sell, 70.0, 15);
        assert_eq!(d.signal.signal_type, SignalType::Sell);
        assert_eq!(s.state().opposite_signal_streak, 0);
        assert_eq!(s.state().last_actionable_signal, Some(SignalType::Sell));
        assert_eq!(s.state().consecutive_same_signals, 1);
    }

    #[test]
    fn test_reversal_allowed_after_lock() {
        let mut s = SignalStabilizer::default();
        run(&mut s, SignalType::Buy, 70.0, 0);
        // 60s lock * 1.2 reversal factor
        assert_eq!(run(&mut s, SignalType::Sell, 70.0, 50).hold_reason, Some(HoldReason::LockActive));
        assert_eq!(run(&mut s, SignalType::Sell, 70.0, 73).signal.signal_type, SignalType::Sell);
    }

    #[test]
    fn test_moderate_signal_needs_confirmation() {
        let mut s = SignalStabilizer::default();
        for at in [0, 5, 10] {
            let d = run(&mut s, SignalType::Buy, 50.0, at);
            assert_eq!(d.signal.signal_type, SignalType::Hold);
            assert_eq!(d.hold_reason, Some(HoldReason::Inconsistent));
        }
        assert!(s.history().all(|e| e.signal_type == SignalType::Hold && e.raw_type == SignalType::Buy));
        assert_eq!(s.state().last_actionable_signal, None);
    }

    #[test]
    fn test_emitted_signals_confirm_moderate_follow_up() {
        let mut s = SignalStabilizer::default();
        assert_eq!(run(&mut s, SignalType::Buy, 70.0, 0).signal.signal_type, SignalType::Buy);
        // one emitted BUY is below the default bar of two
        assert_eq!(run(&mut s, SignalType::Buy, 50.0, 5).hold_reason, Some(HoldReason::Inconsistent));
        assert_eq!(run(&mut s, SignalType::Buy, 70.0, 10).signal.signal_type, SignalType::Buy);
        let d = run(&mut s, SignalType::Buy, 50.0, 15);
        assert_eq!(d.signal.signal_type, SignalType::Buy);
        assert_eq!(d.hold_reason, None);
    }

    #[test]
    fn test_consistency_window_expires() {
        let mut s = SignalStabilizer::default();
        run(&mut s, SignalType::Buy, 70.0, 0);
        run(&mut s, SignalType::Buy, 70.0, 5);
        // both emitted BUYs are older than 90s
        assert_eq!(run(&mut s, SignalType::Buy, 50.0, 120).hold_reason, Some(HoldReason::Inconsistent));
    }

    fn biased(kind: RegimeKind, direction: TrendDirection) -> MarketRegime {
        MarketRegime {
            kind,
            strength: 40.0,
            direction,
            volatility: 20.0,
        }
    }

    /// Emitted SELL at 0s, emitted BUY at 55s (past the 50.4s reversal lock),
    /// then a moderate BUY at 60s with one same and one opposite entry in window
    fn moderate_buy_after_mixed_history(regime: MarketRegime) -> StabilizerDecision {
        let mut s = SignalStabilizer::default();
        let sell = s.stabilize(&raw(SignalType::Sell, 80.0, secs(0)), regime, secs(0));
        assert_eq!(sell.signal.signal_type, SignalType::Sell);
        let buy = s.stabilize(&raw(SignalType::Buy, 80.0, secs(55)), regime, secs(55));
        assert_eq!(buy.signal.signal_type, SignalType::Buy);
        s.stabilize(&raw(SignalType::Buy, 50.0, secs(60)), regime, secs(60))
    }

    #[test]
    fn test_accumulation_relaxes_bar_for_buy() {
        let d = moderate_buy_after_mixed_history(biased(RegimeKind::Accumulation, TrendDirection::Up));
        assert_eq!(d.signal.signal_type, SignalType::Buy);
        assert_eq!(d.hold_reason, None);
    }

    #[test]
    fn test_distribution_keeps_default_bar_for_buy() {
        let d = moderate_buy_after_mixed_history(biased(RegimeKind::Distribution, TrendDirection::Down));
        assert_eq!(d.signal.signal_type, SignalType::Hold);
        assert_eq!(d.hold_reason, Some(HoldReason::Inconsistent));
    }

    #[test]
    fn test_strong_aligned_trend_relaxes_bar() {
        let mut s = SignalStabilizer::default();
        let trend = MarketRegime {
            kind: RegimeKind::Trending,
            strength: 85.0,
            direction: TrendDirection::Up,
            volatility: 30.0,
        };
        s.stabilize(&raw(SignalType::Buy, 70.0, secs(0)), trend, secs(0));
        let d = s.stabilize(&raw(SignalType::Buy, 50.0, secs(5)), trend, secs(5));
        assert_eq!(d.signal.signal_type, SignalType::Buy);
        // 60s * 0.7 trending
        assert_eq!(s.state().lock_period_ms, 42_000);
    }

    #[test]
    fn test_volatility_lengthens_lock() {
        let mut s = SignalStabilizer::default();
        let volatile = MarketRegime {
            kind: RegimeKind::Volatile,
            strength: 20.0,
            direction: TrendDirection::None,
            volatility: 95.0,
        };
        s.stabilize(&raw(SignalType::Buy, 70.0, secs(0)), volatile, secs(0));
        assert_eq!(s.state().lock_period_ms, 90_000);
        let d = s.stabilize(&raw(SignalType::Sell, 70.0, secs(60)), volatile, secs(60));
        assert_eq!(d.hold_reason, Some(HoldReason::LockActive));
        let d = s.stabilize(&raw(SignalType::Sell, 70.0, secs(91)), volatile, secs(91));
        assert_eq!(d.signal.signal_type, SignalType::Sell);
    }

    #[test]
    fn test_low_confidence_against_average() {
        let mut s = SignalStabilizer::default();
        let trend = MarketRegime {
            kind: RegimeKind::Trending,
            strength: 85.0,
            direction: TrendDirection::Up,
            volatility: 30.0,
        };
        for i in 0..3 {
            s.stabilize(&raw(SignalType::Buy, 90.0, secs(i * 5)), trend, secs(i * 5));
        }
        let d = s.stabilize(&raw(SignalType::Buy, 40.0, secs(20)), trend, secs(20));
        assert_eq!(d.hold_reason, Some(HoldReason::LowConfidence));
        assert_eq!(d.signal.confidence, 40.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut s = SignalStabilizer::default();
        for i in 0..50 {
            run(&mut s, SignalType::Neutral, 10.0, i);
        }
        assert_eq!(s.history().count(), 20);
        assert_eq!(s.state().hold_count, 50);
    }

    #[test]
    fn test_regime_refresh_is_throttled() {
        let mut s = SignalStabilizer::default();
        s.regime(&[], secs(0));
        let first = s.state().last_regime_check_time;
        s.regime(&[], secs(10));
        assert_eq!(s.state().last_regime_check_time, first);
        s.regime(&[], secs(31));
        assert_eq!(s.state().last_regime_check_time, Some(secs(31)));
    }
}
