//! Property tests for the signal-core building blocks

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use signal_core::config::BackoffConfig;
use signal_core::data::{Candle, CandleStore, Interval};
use signal_core::indicators::{
    calculate_ema, calculate_macd, calculate_rsi, calculate_sma, support_resistance, LevelConfig,
};
use signal_core::source::Backoff;
use signal_core::strategy::{MarketRegime, Signal, SignalStabilizer, SignalType};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn candle(minute: i64, close: f64) -> Candle {
    Candle::with_interval(
        t0() + Duration::minutes(minute),
        Interval::OneMinute,
        close,
        close * 1.01,
        close * 0.99,
        close,
        10.0,
    )
}

#[test]
fn test_backoff_first_five_failures() {
    let mut backoff = Backoff::new(BackoffConfig::default());
    let delays: Vec<u128> = (0..5)
        .map(|_| backoff.next_delay().unwrap().as_millis())
        .collect();
    assert_eq!(delays, vec![1_000, 1_500, 2_250, 3_375, 5_062]);
}

#[test]
fn test_macd_warmup_alignment() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.25).sin()).collect();
    let macd = calculate_macd(&closes, 12, 26, 9);
    assert_eq!(macd.line.len(), 60);
    assert!(macd.line[24].is_none() && macd.line[25].is_some());
    assert!(macd.signal[32].is_none() && macd.signal[33].is_some());
    assert!(macd.histogram[33].is_some());
}

proptest! {
    #[test]
    fn prop_repeated_open_time_keeps_length(
        updates in prop::collection::vec((0i64..40, 1.0f64..500.0), 1..150)
    ) {
        let mut store = CandleStore::new("BTCUSDT", Interval::OneMinute, 1_000);
        for (minute, close) in updates {
            let c = candle(minute, close);
            let existed = store.find(&c).is_some();
            let before = store.len();
            store.update(c.clone());
            if existed {
                prop_assert_eq!(store.len(), before);
            } else {
                prop_assert_eq!(store.len(), before + 1);
            }
            prop_assert_eq!(store.find(&c).map(|s| s.close), Some(close));
        }
        let snapshot = store.snapshot();
        prop_assert!(snapshot.candles().windows(2).all(|w| w[0].open_time < w[1].open_time));
    }

    #[test]
    fn prop_indicators_aligned_with_warmup(
        closes in prop::collection::vec(1.0f64..1_000.0, 0..200),
        period in 2usize..30,
    ) {
        let sma = calculate_sma(&closes, period);
        let ema = calculate_ema(&closes, period);
        let rsi = calculate_rsi(&closes, period);
        prop_assert_eq!(sma.len(), closes.len());
        prop_assert_eq!(ema.len(), closes.len());
        prop_assert_eq!(rsi.len(), closes.len());

        for i in 0..closes.len() {
            if i + 1 < period {
                prop_assert!(sma[i].is_none());
                prop_assert!(ema[i].is_none());
            } else {
                prop_assert!(sma[i].is_some());
                prop_assert!(ema[i].is_some());
            }
            if i < period {
                prop_assert!(rsi[i].is_none());
            }
            if let Some(v) = rsi[i] {
                prop_assert!((0.0..=100.0).contains(&v));
            }
        }
    }

    #[test]
    fn prop_ema_converges_on_constant(price in 0.01f64..100_000.0, period in 1usize..50) {
        let closes = vec![price; period * 20 + 10];
        let ema = calculate_ema(&closes, period);
        let last = ema.last().copied().flatten().unwrap();
        prop_assert!((last - price).abs() <= price * 1e-9);
    }

    #[test]
    fn prop_levels_inside_window_envelope(
        closes in prop::collection::vec(10.0f64..200.0, 5..250),
        lookback in 10usize..120,
    ) {
        let highs: Vec<f64> = closes.iter().enumerate().map(|(i, c)| c + 1.0 + (i % 3) as f64).collect();
        let lows: Vec<f64> = closes.iter().enumerate().map(|(i, c)| c - 1.0 - (i % 4) as f64 * 0.5).collect();
        let config = LevelConfig { lookback, ..LevelConfig::default() };
        let levels = support_resistance(&highs, &lows, &closes, &config);

        let start = closes.len().saturating_sub(lookback);
        let min_low = lows[start..].iter().copied().fold(f64::INFINITY, f64::min);
        let max_high = highs[start..].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for level in levels.support.iter().chain(levels.resistance.iter()) {
            prop_assert!(*level >= min_low && *level <= max_high, "level {} outside [{}, {}]", level, min_low, max_high);
        }
    }

    #[test]
    fn prop_backoff_non_decreasing_and_capped(failures in 1u32..12) {
        let mut backoff = Backoff::new(BackoffConfig { max_attempts: 20, ..BackoffConfig::default() });
        let delays: Vec<_> = (0..failures).filter_map(|_| backoff.next_delay()).collect();
        prop_assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(delays.iter().all(|d| d.as_millis() <= 30_000));
    }

    #[test]
    fn prop_quick_reversal_always_held(first in 65.0f64..=100.0, second in 0.0f64..=100.0) {
        let mut stabilizer = SignalStabilizer::default();
        let regime = MarketRegime::undefined();
        let buy = stabilizer.stabilize(&Signal::buy(first, t0()), regime, t0());
        prop_assert_eq!(buy.signal.signal_type, SignalType::Buy);

        let at = t0() + Duration::seconds(10);
        let sell = stabilizer.stabilize(&Signal::sell(second, at), regime, at);
        prop_assert_eq!(sell.signal.signal_type, SignalType::Hold);
    }

    #[test]
    fn prop_confident_repeats_emit(confidences in prop::array::uniform3(65.0f64..=100.0)) {
        let mut stabilizer = SignalStabilizer::default();
        let regime = MarketRegime::undefined();
        for (i, confidence) in confidences.iter().enumerate() {
            let at = t0() + Duration::seconds(5 * i as i64);
            let out = stabilizer.stabilize(&Signal::buy(*confidence, at), regime, at);
            prop_assert_eq!(out.signal.signal_type, SignalType::Buy);
        }
    }
}
