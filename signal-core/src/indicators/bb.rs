//! Bollinger Bands indicator

use crate::error::IndicatorError;
use crate::indicators::Indicator;
use serde::{Deserialize, Serialize};
use ta::indicators::{BollingerBands as TaBollingerBands, BollingerBandsOutput};
use ta::Next;

/// Bollinger Bands indicator wrapper
#[derive(Debug, Clone)]
pub struct BollingerBands {
    inner: TaBollingerBands,
    period: usize,
    std_dev: f64,
    update_count: usize,
    last_output: Option<BollingerBandsOutput>,
}

impl BollingerBands {
    /// Create new Bollinger Bands indicator
    pub fn new(period: usize, std_dev: f64) -> Result<Self, IndicatorError> {
        let inner = TaBollingerBands::new(period, std_dev)
            .map_err(|_| IndicatorError::InvalidPeriod(period, "BollingerBands"))?;
        Ok(Self {
            inner,
            period,
            std_dev,
            update_count: 0,
            last_output: None,
        })
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// Get upper band
    pub fn upper(&self) -> Option<f64> {
        self.last_output.as_ref().map(|o| o.upper)
    }

    /// Get middle band (SMA)
    pub fn middle(&self) -> Option<f64> {
        self.last_output.as_ref().map(|o| o.average)
    }

    /// Get lower band
    pub fn lower(&self) -> Option<f64> {
        self.last_output.as_ref().map(|o| o.lower)
    }
}

impl Indicator for BollingerBands {
    fn name(&self) -> &str {
        "BollingerBands"
    }

    fn update(&mut self, value: f64) {
        let output = self.inner.next(value);
        self.update_count += 1;
        if self.update_count >= self.period {
            self.last_output = Some(output);
        }
    }

    fn value(&self) -> Option<f64> {
        self.middle()
    }

    fn is_ready(&self) -> bool {
        self.update_count >= self.period
    }
}

/// Index-aligned Bollinger output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerSeries {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Calculate Bollinger Bands (`middle ± k·stdev`) over `period` values
pub fn calculate_bollinger(values: &[f64], period: usize, std_dev: f64) -> BollingerSeries {
    let mut series = BollingerSeries::default();
    let Ok(mut bb) = BollingerBands::new(period, std_dev) else {
        series.upper = vec![None; values.len()];
        series.middle = vec![None; values.len()];
        series.lower = vec![None; values.len()];
        return series;
    };
    for &value in values {
        bb.update(value);
        series.upper.push(bb.upper());
        series.middle.push(bb.middle());
        series.lower.push(bb.lower());
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_envelope_middle() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + (i % 5) as f64).collect();
        let out = calculate_bollinger(&values, 20, 2.0);
        assert!(out.middle[18].is_none());
        let (u, m, l) = (out.upper[30].unwrap(), out.middle[30].unwrap(), out.lower[30].unwrap());
        assert!(u > m && m > l);
        assert!(((u - m) - (m - l)).abs() < 1e-9);
    }
}
