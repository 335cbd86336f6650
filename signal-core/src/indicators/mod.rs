//! Technical indicators module
//!
//! Streaming indicator wrappers plus `calculate_*` helpers that return
//! index-aligned series. Entries before an indicator's warm-up are `None`,
//! never zero.

pub mod atr;
pub mod bb;
pub mod ema;
pub mod engine;
pub mod levels;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use atr::*;
pub use bb::*;
pub use ema::*;
pub use engine::*;
pub use levels::*;
pub use macd::*;
pub use rsi::*;
pub use sma::*;

/// Indicator trait for single-input streaming indicators
pub trait Indicator {
    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new value
    fn update(&mut self, value: f64);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}

/// Feed every value through a fresh indicator and collect the aligned output
pub(crate) fn collect_series<I: Indicator>(mut indicator: I, values: &[f64]) -> Vec<Option<f64>> {
    values
        .iter()
        .map(|&value| {
            indicator.update(value);
            indicator.value()
        })
        .collect()
}
