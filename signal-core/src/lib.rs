//! Signal-Core: real-time trading signal pipeline
//!
//! Candles flow from a pluggable market data source into a bounded per-session
//! store, through a pure indicator engine and a voting synthesizer, and are
//! de-chattered by a regime-aware stabilizer before reaching alerting.
//!
//! # Features
//!
//! - **Data Management**: OHLCV candles, rolling deduplicated store
//! - **Technical Indicators**: SMA, EMA, RSI, MACD, Bollinger, ATR, support/resistance
//! - **Signal Synthesis**: weighted indicator and candlestick-pattern votes with price targets
//! - **Stabilization**: consistency gate, lock-period hysteresis, streak override
//! - **Ingestion**: push, polling and simulated feeds with backoff and stale detection
//! - **Alerts**: thresholded, rate-limited notifications
//!
//! # Example
//!
//! ```no_run
//! use signal_core::prelude::*;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::default();
//!     let source = MarketDataSource::new(Arc::new(SimulatedFeed::default()), config.source.clone());
//!     let (event_tx, mut events) = mpsc::channel(64);
//!     let (command_tx, commands) = mpsc::channel(8);
//!     let runner = PipelineRunner::new(config, source, event_tx);
//!     tokio::spawn(runner.run(commands));
//!
//!     command_tx
//!         .send(PipelineCommand::Switch { symbol: "BTCUSDT".into(), interval: Interval::OneMinute })
//!         .await?;
//!     while let Some(PipelineEvent::Signal(output)) = events.recv().await {
//!         println!("{} {:.0}%", output.signal.signal_type, output.signal.confidence);
//!     }
//!     Ok(())
//! }
//! ```

pub mod alerts;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod pipeline;
pub mod source;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::alerts::*;
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::error::*;
    pub use crate::indicators::*;
    pub use crate::pipeline::*;
    pub use crate::source::*;
    pub use crate::strategy::*;

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
