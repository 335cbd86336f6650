//! Indicator engine: one pass over a candle series producing an aligned
//! snapshot of every indicator the synthesizer reads.

use crate::data::CandleSeries;
use crate::indicators::{
    calculate_atr, calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi,
    calculate_sma, support_resistance, BollingerSeries, LevelConfig, MacdSeries,
    SupportResistance,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub sma_period: usize,
    pub ema_period: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_std_dev: f64,
    pub atr_period: usize,
    pub levels: LevelConfig,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_period: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
            levels: LevelConfig::default(),
        }
    }
}

/// Index-aligned indicator output for one series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma: Vec<Option<f64>>,
    pub ema: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: MacdSeries,
    pub bollinger: BollingerSeries,
    pub atr: Vec<Option<f64>>,
    pub support_resistance: SupportResistance,
}

/// Values at the last index (and the one before, for crossovers)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatestIndicators {
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub prev_macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
}

fn last(values: &[Option<f64>]) -> Option<f64> {
    values.last().copied().flatten()
}

fn before_last(values: &[Option<f64>]) -> Option<f64> {
    values.len().checked_sub(2).and_then(|i| values[i])
}

impl IndicatorSnapshot {
    /// Length of the series the snapshot was computed from
    pub fn len(&self) -> usize {
        self.sma.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sma.is_empty()
    }

    pub fn latest(&self) -> LatestIndicators {
        LatestIndicators {
            sma: last(&self.sma),
            ema: last(&self.ema),
            rsi: last(&self.rsi),
            macd_line: last(&self.macd.line),
            macd_signal: last(&self.macd.signal),
            macd_histogram: last(&self.macd.histogram),
            prev_macd_histogram: before_last(&self.macd.histogram),
            bb_upper: last(&self.bollinger.upper),
            bb_middle: last(&self.bollinger.middle),
            bb_lower: last(&self.bollinger.lower),
            atr: last(&self.atr),
        }
    }
}

/// Pure, deterministic indicator computation
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn compute(&self, series: &CandleSeries) -> IndicatorSnapshot {
        let c = &self.config;
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        IndicatorSnapshot {
            sma: calculate_sma(&closes, c.sma_period),
            ema: calculate_ema(&closes, c.ema_period),
            rsi: calculate_rsi(&closes, c.rsi_period),
            macd: calculate_macd(&closes, c.macd_fast, c.macd_slow, c.macd_signal),
            bollinger: calculate_bollinger(&closes, c.bb_period, c.bb_std_dev),
            atr: calculate_atr(&highs, &lows, &closes, c.atr_period),
            support_resistance: support_resistance(&highs, &lows, &closes, &c.levels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Candle, Interval};
    use chrono::{Duration, TimeZone, Utc};

    fn series(len: usize) -> CandleSeries {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..len)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.2).sin() * 3.0;
                Candle::with_interval(
                    t0 + Duration::minutes(i as i64),
                    Interval::OneMinute,
                    close,
                    close + 0.5,
                    close - 0.5,
                    close,
                    100.0,
                )
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_every_series_is_aligned() {
        let snap = IndicatorEngine::default().compute(&series(80));
        assert_eq!(snap.len(), 80);
        for s in [&snap.sma, &snap.ema, &snap.rsi, &snap.atr, &snap.macd.line, &snap.bollinger.upper] {
            assert_eq!(s.len(), 80);
        }
    }

    #[test]
    fn test_short_series_has_no_values() {
        let snap = IndicatorEngine::default().compute(&series(10));
        let latest = snap.latest();
        assert_eq!(latest.sma, None);
        assert_eq!(latest.rsi, None);
        assert_eq!(latest.macd_line, None);
    }

    #[test]
    fn test_latest_values_present_after_warm_up() {
        let latest = IndicatorEngine::default().compute(&series(120)).latest();
        assert!(latest.ema.is_some());
        assert!(latest.macd_signal.is_some());
        assert!(latest.prev_macd_histogram.is_some());
        let rsi = latest.rsi.unwrap();
        assert!((0.0..=100.0).contains(&rsi));
    }
}
