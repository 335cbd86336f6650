//! RSI (Relative Strength Index) indicator

use crate::error::IndicatorError;
use crate::indicators::{collect_series, Indicator};

/// Wilder-smoothed RSI.
///
/// The first value appears once `period` price changes have been seen, so
/// index `period` of an aligned output is the first defined entry.
#[derive(Debug, Clone)]
pub struct RSI {
    period: usize,
    prev_value: Option<f64>,
    changes: usize,
    avg_gain: f64,
    avg_loss: f64,
    last_value: Option<f64>,
}

impl RSI {
    /// Create new RSI indicator
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidPeriod(period, "RSI"));
        }
        Ok(Self {
            period,
            prev_value: None,
            changes: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            last_value: None,
        })
    }

    /// Get RSI period
    pub fn period(&self) -> usize {
        self.period
    }

    fn compute(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
    }
}

impl Indicator for RSI {
    fn name(&self) -> &str {
        "RSI"
    }

    fn update(&mut self, value: f64) {
        let Some(prev) = self.prev_value.replace(value) else {
            return;
        };
        let change = value - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let period = self.period as f64;
        self.changes += 1;

        if self.changes <= self.period {
            // seed phase: plain average of the first `period` changes
            self.avg_gain += gain / period;
            self.avg_loss += loss / period;
            if self.changes == self.period {
                self.last_value = Some(Self::compute(self.avg_gain, self.avg_loss));
            }
        } else {
            self.avg_gain = (self.avg_gain * (period - 1.0) + gain) / period;
            self.avg_loss = (self.avg_loss * (period - 1.0) + loss) / period;
            self.last_value = Some(Self::compute(self.avg_gain, self.avg_loss));
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.last_value.is_some()
    }
}

/// Calculate RSI from a series of values
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    match RSI::new(period) {
        Ok(rsi) => collect_series(rsi, values),
        Err(_) => vec![None; values.len()],
    }
}
