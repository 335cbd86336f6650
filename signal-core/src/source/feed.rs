//! Provider abstraction

use crate::data::{Candle, Interval};
use crate::error::SourceError;
use crate::source::SourceHealth;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt::Debug;
use std::time::Duration;

pub type CandleStream = BoxStream<'static, Result<Candle, SourceError>>;

/// How a feed delivers incremental updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// `subscribe` yields a stream of candle updates
    Push,
    /// Re-fetch the most recent candles at a fixed cadence
    Poll { every: Duration },
}

/// A market data provider
#[async_trait]
pub trait CandleFeed: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Health reported while this feed is connected
    fn health(&self) -> SourceHealth {
        SourceHealth::Live
    }

    fn mode(&self) -> FeedMode {
        FeedMode::Push
    }

    /// Most recent `limit` candles, oldest first
    async fn fetch_history(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError>;

    async fn subscribe(&self, _symbol: &str, _interval: Interval) -> Result<CandleStream, SourceError> {
        Err(SourceError::Unsupported("push subscription"))
    }
}
