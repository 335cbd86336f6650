//! Market regime classification over recent candles

use crate::data::Candle;
use crate::strategy::SignalType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegimeKind {
    Trending,
    Accumulation,
    Distribution,
    Volatile,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Up,
    Down,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    pub kind: RegimeKind,
    /// 0..=100
    pub strength: f64,
    pub direction: TrendDirection,
    /// 0..=100
    pub volatility: f64,
}

impl MarketRegime {
    pub fn undefined() -> Self {
        Self {
            kind: RegimeKind::Undefined,
            strength: 0.0,
            direction: TrendDirection::None,
            volatility: 0.0,
        }
    }

    /// Trending with `strength` above the threshold
    pub fn is_strong_trend(&self, threshold: f64) -> bool {
        self.kind == RegimeKind::Trending && self.strength > threshold
    }

    /// Whether the regime's bias points the same way as `signal`
    pub fn aligned_with(&self, signal: SignalType) -> bool {
        matches!(
            (self.direction, signal),
            (TrendDirection::Up, SignalType::Buy) | (TrendDirection::Down, SignalType::Sell)
        )
    }

    /// Accumulation favours BUY, distribution favours SELL
    pub fn favors(&self, signal: SignalType) -> bool {
        matches!(
            (self.kind, signal),
            (RegimeKind::Accumulation, SignalType::Buy) | (RegimeKind::Distribution, SignalType::Sell)
        )
    }
}

impl Default for MarketRegime {
    fn default() -> Self {
        Self::undefined()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Candles inspected per classification
    pub lookback: usize,
    /// Fewer candles than this classify as UNDEFINED
    pub min_candles: usize,
    /// Volatility score at or above which the regime is VOLATILE
    pub volatile_threshold: f64,
    /// Trend strength at or above which the regime is TRENDING
    pub trending_threshold: f64,
    /// Trend strength needed before a direction is reported
    pub direction_threshold: f64,
    /// Score points per 1% standard deviation of close-to-close returns
    pub volatility_scale: f64,
    /// Up/down volume ratio marking accumulation (or its inverse, distribution)
    pub volume_bias_ratio: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            lookback: 50,
            min_candles: 20,
            volatile_threshold: 80.0,
            trending_threshold: 60.0,
            direction_threshold: 25.0,
            volatility_scale: 40.0,
            volume_bias_ratio: 1.2,
        }
    }
}

/// Stateless classifier; throttling and caching live with the stabilizer
#[derive(Debug, Clone, Default)]
pub struct MarketRegimeDetector {
    config: RegimeConfig,
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Coefficient of determination of a least-squares line through `values`
fn r_squared(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return 0.0;
    }
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return 0.0;
    }
    (sxy * sxy / (sxx * syy)).clamp(0.0, 1.0)
}

impl MarketRegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    pub fn classify(&self, candles: &[Candle]) -> MarketRegime {
        let c = &self.config;
        let start = candles.len().saturating_sub(c.lookback);
        let window = &candles[start..];
        if window.len() < c.min_candles.max(3) {
            return MarketRegime::undefined();
        }

        let closes: Vec<f64> = window.iter().map(|k| k.close).collect();
        let returns: Vec<f64> = closes
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0] * 100.0)
            .collect();
        let volatility = (std_dev(&returns) * c.volatility_scale).clamp(0.0, 100.0);

        let net = closes[closes.len() - 1] - closes[0];
        let path: f64 = closes.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        let efficiency = if path > 0.0 { net.abs() / path } else { 0.0 };
        let strength = ((efficiency * 0.5 + r_squared(&closes) * 0.5) * 100.0).clamp(0.0, 100.0);

        let direction = if strength >= c.direction_threshold && net > 0.0 {
            TrendDirection::Up
        } else if strength >= c.direction_threshold && net < 0.0 {
            TrendDirection::Down
        } else {
            TrendDirection::None
        };

        let up_volume: f64 = window.iter().filter(|k| k.is_bullish()).map(|k| k.volume).sum();
        let down_volume: f64 = window.iter().filter(|k| k.is_bearish()).map(|k| k.volume).sum();

        if volatility >= c.volatile_threshold {
            return MarketRegime {
                kind: RegimeKind::Volatile,
                strength: volatility,
                direction,
                volatility,
            };
        }
        if strength >= c.trending_threshold {
            return MarketRegime {
                kind: RegimeKind::Trending,
                strength,
                direction,
                volatility,
            };
        }
        if up_volume > 0.0 && up_volume >= down_volume * c.volume_bias_ratio {
            let bias = if down_volume > 0.0 { up_volume / down_volume } else { 2.0 };
            return MarketRegime {
                kind: RegimeKind::Accumulation,
                strength: ((bias - 1.0) * 100.0).clamp(0.0, 100.0),
                direction: TrendDirection::Up,
                volatility,
            };
        }
        if down_volume > 0.0 && down_volume >= up_volume * c.volume_bias_ratio {
            let bias = if up_volume > 0.0 { down_volume / up_volume } else { 2.0 };
            return MarketRegime {
                kind: RegimeKind::Distribution,
                strength: ((bias - 1.0) * 100.0).clamp(0.0, 100.0),
                direction: TrendDirection::Down,
                volatility,
            };
        }

        MarketRegime {
            kind: RegimeKind::Undefined,
            strength,
            direction,
            volatility,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interval;
    use chrono::{Duration, TimeZone, Utc};

    fn bars(prices: &[(f64, f64, f64)]) -> Vec<Candle> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, close, volume))| {
                Candle::with_interval(
                    t0 + Duration::minutes(i as i64),
                    Interval::OneMinute,
                    open,
                    open.max(close) + 0.1,
                    open.min(close) - 0.1,
                    close,
                    volume,
                )
            })
            .collect()
    }

    #[test]
    fn test_too_few_candles_is_undefined() {
        let candles = bars(&[(100.0, 101.0, 1.0); 5]);
        assert_eq!(MarketRegimeDetector::default().classify(&candles).kind, RegimeKind::Undefined);
    }

    #[test]
    fn test_steady_rise_is_trending_up() {
        let data: Vec<_> = (0..50).map(|i| (100.0 + i as f64 * 0.5, 100.5 + i as f64 * 0.5, 10.0)).collect();
        let regime = MarketRegimeDetector::default().classify(&bars(&data));
        assert_eq!(regime.kind, RegimeKind::Trending);
        assert_eq!(regime.direction, TrendDirection::Up);
        assert!(regime.strength > 70.0);
        assert!(regime.aligned_with(SignalType::Buy));
    }

    #[test]
    fn test_whipsaw_is_volatile() {
        let data: Vec<_> = (0..50)
            .map(|i| if i % 2 == 0 { (100.0, 106.0, 10.0) } else { (106.0, 100.0, 10.0) })
            .collect();
        let regime = MarketRegimeDetector::default().classify(&bars(&data));
        assert_eq!(regime.kind, RegimeKind::Volatile);
        assert!(regime.volatility >= 80.0);
    }

    #[test]
    fn test_range_with_buying_volume_is_accumulation() {
        let data: Vec<_> = (0..50)
            .map(|i| if i % 2 == 0 { (100.0, 100.2, 30.0) } else { (100.2, 100.0, 10.0) })
            .collect();
        let regime = MarketRegimeDetector::default().classify(&bars(&data));
        assert_eq!(regime.kind, RegimeKind::Accumulation);
        assert!(regime.favors(SignalType::Buy));
        assert!(!regime.favors(SignalType::Sell));
    }
}
