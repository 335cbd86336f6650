//! Bounded rolling candle store for one (symbol, interval) session

use crate::data::{Candle, CandleSeries, Interval};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Default number of candles kept per session
pub const DEFAULT_CAPACITY: usize = 1000;
/// Default relative close change (0.03%) that counts as significant
pub const DEFAULT_SIGNIFICANCE_EPSILON: f64 = 0.0003;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum series length; the oldest candle is evicted beyond it
    pub capacity: usize,
    /// Relative close change above which an update is significant
    pub significance_epsilon: f64,
    /// Recompute anyway after this many consecutive insignificant updates
    pub max_skipped_updates: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            significance_epsilon: DEFAULT_SIGNIFICANCE_EPSILON,
            max_skipped_updates: 10,
        }
    }
}

/// What `CandleStore::update` did with a candle
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    /// Newer than everything stored; pushed at the tail
    Appended { evicted: Option<Candle> },
    /// Same `open_time` as a stored candle; fields overwritten at `index`
    Replaced { index: usize, previous: Candle },
    /// Older than the tail but missing; inserted in order
    Inserted { index: usize },
    /// Older than the head of a full store
    Stale,
}

/// Rolling, deduplicated time series with strictly increasing `open_time`
#[derive(Debug, Clone)]
pub struct CandleStore {
    symbol: String,
    interval: Interval,
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleStore {
    pub fn new(symbol: &str, interval: Interval, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            symbol: symbol.to_uppercase(),
            interval,
            capacity,
            candles: VecDeque::with_capacity(capacity),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.back()
    }

    /// Stored candle with this exact `open_time`
    pub fn find(&self, candle: &Candle) -> Option<&Candle> {
        self.position(candle).ok().and_then(|i| self.candles.get(i))
    }

    fn position(&self, candle: &Candle) -> Result<usize, usize> {
        self.candles
            .binary_search_by(|c| c.open_time.cmp(&candle.open_time))
    }

    /// Apply one candle. A repeated `open_time` overwrites the stored entry
    /// at the same index, so the length never changes for re-ticks of the
    /// forming candle.
    pub fn update(&mut self, candle: Candle) -> UpdateKind {
        let newest = self.candles.back().map(|c| c.open_time);
        if newest.map_or(true, |t| candle.open_time > t) {
            self.candles.push_back(candle);
            let evicted = if self.candles.len() > self.capacity {
                self.candles.pop_front()
            } else {
                None
            };
            return UpdateKind::Appended { evicted };
        }

        match self.position(&candle) {
            Ok(index) => {
                let previous = std::mem::replace(&mut self.candles[index], candle);
                UpdateKind::Replaced { index, previous }
            }
            Err(index) => {
                if index == 0 && self.candles.len() >= self.capacity {
                    debug!(
                        symbol = %self.symbol,
                        open_time = %candle.open_time,
                        "Dropping candle older than the retained window"
                    );
                    return UpdateKind::Stale;
                }
                self.candles.insert(index, candle);
                if self.candles.len() > self.capacity {
                    self.candles.pop_front();
                    return UpdateKind::Inserted { index: index - 1 };
                }
                UpdateKind::Inserted { index }
            }
        }
    }

    /// Apply a backfill batch in time order
    pub fn extend<I: IntoIterator<Item = Candle>>(&mut self, candles: I) -> usize {
        let mut batch: Vec<Candle> = candles.into_iter().collect();
        batch.sort_by_key(|c| c.open_time);
        let count = batch.len();
        for candle in batch {
            self.update(candle);
        }
        count
    }

    /// Owned copy for downstream stages; later store updates never show
    /// through it.
    pub fn snapshot(&self) -> CandleSeries {
        CandleSeries::from_vec(self.candles.iter().cloned().collect())
    }

    pub fn clear(&mut self) {
        self.candles.clear();
    }
}

/// Whether `next` warrants recomputing indicators given the previously
/// stored version `prev` of the series tail.
pub fn is_significant(prev: Option<&Candle>, next: &Candle, epsilon: f64) -> bool {
    let Some(prev) = prev else {
        return true;
    };
    if next.open_time != prev.open_time {
        return true;
    }
    if prev.close == 0.0 {
        return next.close != 0.0;
    }
    ((next.close - prev.close) / prev.close).abs() > epsilon
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candle_at(minute: i64, close: f64) -> Candle {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Candle::with_interval(t, Interval::OneMinute, close, close + 1.0, close - 1.0, close, 5.0)
    }

    #[test]
    fn test_repeated_open_time_replaces_in_place() {
        let mut store = CandleStore::new("btcusdt", Interval::OneMinute, 10);
        store.update(candle_at(0, 100.0));
        store.update(candle_at(1, 101.0));
        let kind = store.update(candle_at(1, 103.0));

        assert_eq!(store.len(), 2);
        assert!(matches!(kind, UpdateKind::Replaced { index: 1, .. }));
        assert_eq!(store.latest().unwrap().close, 103.0);
        assert_eq!(store.symbol(), "BTCUSDT");
    }

    #[test]
    fn test_capacity_evicts_head() {
        let mut store = CandleStore::new("ETHUSDT", Interval::OneMinute, 3);
        for m in 0..5 {
            store.update(candle_at(m, 100.0 + m as f64));
        }
        let snap = store.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap.get(0).unwrap().close, 102.0);
    }

    #[test]
    fn test_out_of_order_insert_keeps_ordering() {
        let mut store = CandleStore::new("ETHUSDT", Interval::OneMinute, 10);
        store.update(candle_at(0, 100.0));
        store.update(candle_at(2, 102.0));
        assert_eq!(store.update(candle_at(1, 101.0)), UpdateKind::Inserted { index: 1 });

        let closes = store.snapshot().closes();
        assert_eq!(closes, vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn test_stale_candle_dropped_when_full() {
        let mut store = CandleStore::new("ETHUSDT", Interval::OneMinute, 2);
        store.update(candle_at(5, 100.0));
        store.update(candle_at(6, 100.0));
        assert_eq!(store.update(candle_at(1, 90.0)), UpdateKind::Stale);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = CandleStore::new("ETHUSDT", Interval::OneMinute, 10);
        store.update(candle_at(0, 100.0));
        let snap = store.snapshot();
        store.update(candle_at(0, 200.0));
        assert_eq!(snap.last().unwrap().close, 100.0);
    }

    #[test]
    fn test_significance() {
        let prev = candle_at(0, 100.0);
        assert!(is_significant(None, &prev, DEFAULT_SIGNIFICANCE_EPSILON));
        assert!(!is_significant(Some(&prev), &candle_at(0, 100.01), DEFAULT_SIGNIFICANCE_EPSILON));
        assert!(is_significant(Some(&prev), &candle_at(0, 100.05), DEFAULT_SIGNIFICANCE_EPSILON));
        assert!(is_significant(Some(&prev), &candle_at(1, 100.0), DEFAULT_SIGNIFICANCE_EPSILON));
    }
}
