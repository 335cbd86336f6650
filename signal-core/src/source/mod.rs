//! Market data ingestion
//!
//! `MarketDataSource` owns one connection task per (symbol, interval). Feeds
//! (live push, polling, simulated) are interchangeable behind `CandleFeed`.

pub mod backoff;
pub mod feed;
pub mod market;
pub mod simulated;

pub use backoff::*;
pub use feed::*;
pub use market::*;
pub use simulated::*;

use crate::data::Candle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the candles currently come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceHealth {
    Live,
    DegradedSimulated,
    Retrying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay_ms: u64 },
    /// Retry budget spent; a manual refresh re-arms the connection
    Unavailable,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub state: ConnectionState,
    pub health: SourceHealth,
    pub feed: String,
}

impl SourceStatus {
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            health: SourceHealth::Retrying,
            feed: String::new(),
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.health == SourceHealth::DegradedSimulated
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} via {} ({:?})", self.state, self.feed, self.health)
    }
}

/// What the connection task delivers downstream
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Initial history for a fresh connection, oldest first
    Backfill(Vec<Candle>),
    Candle(Candle),
    Status(SourceStatus),
}
