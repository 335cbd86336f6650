//! Data management module
//!
//! Candle types, validation and the per-session rolling store.

pub mod candle;
pub mod store;

pub use candle::*;
pub use store::*;
