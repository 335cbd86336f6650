//! Candlestick pattern detectors feeding pattern votes into synthesis

use crate::data::Candle;
use crate::strategy::{SignalVote, VoteDirection, VoteKind};
use serde::{Deserialize, Serialize};

/// Pluggable pattern recognizer
pub trait PatternDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Votes for patterns completed by the last candle of `candles`
    fn detect(&self, candles: &[Candle]) -> Vec<SignalVote>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Minimum engulfing body / engulfed body
    pub engulfing_ratio: f64,
    /// Minimum rejection wick / body for hammer and shooting star
    pub shadow_ratio: f64,
    /// Maximum body / range for hammer and shooting star
    pub small_body_ratio: f64,
    /// Candles inspected for the preceding move
    pub trend_lookback: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            engulfing_ratio: 1.0,
            shadow_ratio: 2.0,
            small_body_ratio: 0.35,
            trend_lookback: 5,
        }
    }
}

/// Engulfing, hammer and shooting star
#[derive(Debug, Clone, Default)]
pub struct CandlestickPatterns {
    config: PatternConfig,
}

impl CandlestickPatterns {
    pub fn new(config: PatternConfig) -> Self {
        Self { config }
    }

    fn engulfing(&self, prev: &Candle, curr: &Candle) -> Option<SignalVote> {
        if prev.body_size() <= 0.0 {
            return None;
        }
        let ratio = curr.body_size() / prev.body_size();
        if ratio < self.config.engulfing_ratio {
            return None;
        }
        let strength = 50.0 + (ratio - 1.0).clamp(0.0, 1.0) * 30.0;

        if prev.is_bearish() && curr.is_bullish() && curr.open <= prev.close && curr.close >= prev.open {
            return Some(SignalVote::new(
                "Bullish Engulfing",
                VoteKind::Pattern,
                VoteDirection::Bullish,
                strength,
                format!("Bullish candle engulfs prior body ({:.2}x)", ratio),
            ));
        }
        if prev.is_bullish() && curr.is_bearish() && curr.open >= prev.close && curr.close <= prev.open {
            return Some(SignalVote::new(
                "Bearish Engulfing",
                VoteKind::Pattern,
                VoteDirection::Bearish,
                strength,
                format!("Bearish candle engulfs prior body ({:.2}x)", ratio),
            ));
        }
        None
    }

    /// Net move over the lookback preceding `curr`; negative means falling
    fn prior_move(&self, candles: &[Candle]) -> Option<f64> {
        let n = candles.len();
        if n < self.config.trend_lookback + 1 {
            return None;
        }
        let from = &candles[n - 1 - self.config.trend_lookback];
        let to = &candles[n - 2];
        Some(to.close - from.close)
    }

    fn rejection(&self, candles: &[Candle], curr: &Candle) -> Option<SignalVote> {
        let range = curr.range();
        if range <= 0.0 {
            return None;
        }
        let body = curr.body_size().max(range * 0.01);
        if body / range > self.config.small_body_ratio {
            return None;
        }
        let prior = self.prior_move(candles)?;

        if curr.lower_wick() >= body * self.config.shadow_ratio && curr.upper_wick() <= body && prior < 0.0 {
            return Some(SignalVote::new(
                "Hammer",
                VoteKind::Pattern,
                VoteDirection::Bullish,
                45.0,
                "Long lower wick after a decline",
            ));
        }
        if curr.upper_wick() >= body * self.config.shadow_ratio && curr.lower_wick() <= body && prior > 0.0 {
            return Some(SignalVote::new(
                "Shooting Star",
                VoteKind::Pattern,
                VoteDirection::Bearish,
                45.0,
                "Long upper wick after an advance",
            ));
        }
        None
    }
}

impl PatternDetector for CandlestickPatterns {
    fn name(&self) -> &str {
        "candlestick"
    }

    fn detect(&self, candles: &[Candle]) -> Vec<SignalVote> {
        let n = candles.len();
        if n < 2 {
            return Vec::new();
        }
        let (prev, curr) = (&candles[n - 2], &candles[n - 1]);
        self.engulfing(prev, curr)
            .into_iter()
            .chain(self.rejection(candles, curr))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interval;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::with_interval(t0 + Duration::minutes(i), Interval::OneMinute, open, high, low, close, 1.0)
    }

    #[test]
    fn test_bullish_engulfing() {
        let candles = vec![bar(0, 102.0, 102.5, 99.5, 100.0), bar(1, 99.8, 103.5, 99.5, 103.0)];
        let votes = CandlestickPatterns::default().detect(&candles);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].direction, VoteDirection::Bullish);
        assert_eq!(votes[0].kind, VoteKind::Pattern);
    }

    #[test]
    fn test_bearish_engulfing() {
        let candles = vec![bar(0, 100.0, 102.5, 99.5, 102.0), bar(1, 102.2, 102.5, 98.5, 99.0)];
        let votes = CandlestickPatterns::default().detect(&candles);
        assert_eq!(votes[0].source, "Bearish Engulfing");
    }

    #[test]
    fn test_hammer_after_decline() {
        let mut candles: Vec<Candle> = (0..6)
            .map(|i| {
                let p = 110.0 - i as f64 * 2.0;
                bar(i, p + 0.5, p + 1.0, p - 1.0, p)
            })
            .collect();
        candles.push(bar(6, 99.0, 99.6, 95.0, 99.5));
        let votes = CandlestickPatterns::default().detect(&candles);
        assert!(votes.iter().any(|v| v.source == "Hammer"));
    }

    #[test]
    fn test_no_pattern_on_single_candle() {
        assert!(CandlestickPatterns::default().detect(&[bar(0, 1.0, 2.0, 0.5, 1.5)]).is_empty());
    }
}
