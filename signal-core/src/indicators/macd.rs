//! MACD (Moving Average Convergence Divergence) indicator

use crate::error::IndicatorError;
use crate::indicators::{Indicator, EMA};
use serde::{Deserialize, Serialize};

/// Streaming MACD built from SMA-seeded EMAs
#[derive(Debug, Clone)]
pub struct MACD {
    fast: EMA,
    slow: EMA,
    signal_ema: EMA,
    last_line: Option<f64>,
    last_signal: Option<f64>,
}

impl MACD {
    /// Create new MACD indicator
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, IndicatorError> {
        Ok(Self {
            fast: EMA::new(fast_period)?,
            slow: EMA::new(slow_period)?,
            signal_ema: EMA::new(signal_period)?,
            last_line: None,
            last_signal: None,
        })
    }

    /// Get MACD line value
    pub fn macd(&self) -> Option<f64> {
        self.last_line
    }

    /// Get signal line value
    pub fn signal(&self) -> Option<f64> {
        self.last_signal
    }

    /// Get histogram value (MACD - Signal)
    pub fn histogram(&self) -> Option<f64> {
        Some(self.last_line? - self.last_signal?)
    }
}

impl Indicator for MACD {
    fn name(&self) -> &str {
        "MACD"
    }

    fn update(&mut self, value: f64) {
        self.fast.update(value);
        self.slow.update(value);
        if let (Some(fast), Some(slow)) = (self.fast.value(), self.slow.value()) {
            let line = fast - slow;
            self.last_line = Some(line);
            self.signal_ema.update(line);
            self.last_signal = self.signal_ema.value();
        }
    }

    fn value(&self) -> Option<f64> {
        self.macd()
    }

    fn is_ready(&self) -> bool {
        self.last_signal.is_some()
    }
}

/// Index-aligned MACD output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// Calculate MACD line, signal line and histogram
pub fn calculate_macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdSeries {
    let Ok(mut macd) = MACD::new(fast_period, slow_period, signal_period) else {
        return MacdSeries {
            line: vec![None; values.len()],
            signal: vec![None; values.len()],
            histogram: vec![None; values.len()],
        };
    };

    let mut series = MacdSeries::default();
    for &value in values {
        macd.update(value);
        series.line.push(macd.macd());
        series.signal.push(macd.signal());
        series.histogram.push(macd.histogram());
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warm_up_boundaries() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin()).collect();
        let out = calculate_macd(&values, 12, 26, 9);
        assert_eq!(out.line.len(), 60);
        assert!(out.line[24].is_none());
        assert!(out.line[25].is_some());
        assert!(out.signal[32].is_none());
        assert!(out.signal[33].is_some());
        let h = out.histogram[40].unwrap();
        assert!((h - (out.line[40].unwrap() - out.signal[40].unwrap())).abs() < 1e-12);
    }

    #[test]
    fn test_flat_series_has_zero_macd() {
        let out = calculate_macd(&vec![50.0; 50], 12, 26, 9);
        assert!(out.line[49].unwrap().abs() < 1e-9);
        assert!(out.histogram[49].unwrap().abs() < 1e-9);
    }
}
