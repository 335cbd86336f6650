//! EMA (Exponential Moving Average) indicator

use crate::error::IndicatorError;
use crate::indicators::{collect_series, Indicator};

/// EMA seeded with the SMA of the first `period` values.
///
/// `ema[i] = value[i] * k + ema[i-1] * (1 - k)` with `k = 2 / (period + 1)`.
#[derive(Debug, Clone)]
pub struct EMA {
    period: usize,
    k: f64,
    update_count: usize,
    seed_sum: f64,
    last_value: Option<f64>,
}

impl EMA {
    /// Create new EMA indicator
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        if period == 0 {
            return Err(IndicatorError::InvalidPeriod(period, "EMA"));
        }
        Ok(Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            update_count: 0,
            seed_sum: 0.0,
            last_value: None,
        })
    }

    /// Get EMA period
    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for EMA {
    fn name(&self) -> &str {
        "EMA"
    }

    fn update(&mut self, value: f64) {
        self.update_count += 1;
        match self.last_value {
            Some(prev) => {
                self.last_value = Some(value * self.k + prev * (1.0 - self.k));
            }
            None => {
                self.seed_sum += value;
                if self.update_count == self.period {
                    self.last_value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.last_value.is_some()
    }
}

/// Calculate EMA from a series of values
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    match EMA::new(period) {
        Ok(ema) => collect_series(ema, values),
        Err(_) => vec![None; values.len()],
    }
}

/// EMA over a series that itself has a warm-up prefix of `None`s.
/// The leading gap is carried through and the EMA is seeded from the first
/// `period` defined values.
pub fn calculate_ema_sparse(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let Ok(mut ema) = EMA::new(period) else {
        return vec![None; values.len()];
    };
    values
        .iter()
        .map(|value| match value {
            Some(v) => {
                ema.update(*v);
                ema.value()
            }
            None => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_with_sma() {
        let out = calculate_ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(4.0));
        // k = 0.5
        assert_eq!(out[3], Some(6.0));
    }

    #[test]
    fn test_constant_series_converges() {
        let values = vec![42.0; 200];
        let out = calculate_ema(&values, 20);
        let last = out.last().copied().flatten().unwrap();
        assert!((last - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_input_keeps_gap() {
        let out = calculate_ema_sparse(&[None, None, Some(1.0), Some(3.0), Some(5.0)], 2);
        assert_eq!(out[..3], [None, None, None]);
        assert_eq!(out[3], Some(2.0));
    }
}
