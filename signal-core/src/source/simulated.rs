//! Seeded random-walk feed, always reported as degraded/simulated

use crate::data::{Candle, Interval};
use crate::error::SourceError;
use crate::source::{CandleFeed, CandleStream, SourceHealth};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    pub seed: u64,
    pub start_price: f64,
    /// Maximum relative move per tick
    pub volatility: f64,
    pub tick_every: Duration,
    pub ticks_per_candle: u32,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            start_price: 100.0,
            volatility: 0.002,
            tick_every: Duration::from_secs(1),
            ticks_per_candle: 10,
        }
    }
}

#[derive(Debug)]
struct WalkState {
    rng: StdRng,
    price: f64,
    forming: Option<Candle>,
    ticks: u32,
}

impl WalkState {
    fn step(&mut self, volatility: f64) -> f64 {
        let change = self.rng.gen_range(-1.0..=1.0) * volatility;
        self.price = (self.price * (1.0 + change)).max(f64::MIN_POSITIVE);
        self.price
    }

    fn volume(&mut self) -> f64 {
        self.rng.gen_range(1.0..100.0)
    }
}

/// Bucket start containing `t`
fn bucket_start(t: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let ms = interval.duration().num_milliseconds().max(1);
    let ts = t.timestamp_millis();
    Utc.timestamp_millis_opt(ts - ts.rem_euclid(ms))
        .single()
        .unwrap_or(t)
}

#[derive(Debug, Clone)]
pub struct SimulatedFeed {
    config: SimulatedConfig,
    walks: Arc<Mutex<HashMap<String, WalkState>>>,
}

impl SimulatedFeed {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            walks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn new_walk(config: &SimulatedConfig, symbol: &str) -> WalkState {
        let salt = symbol
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        WalkState {
            rng: StdRng::seed_from_u64(config.seed ^ salt),
            price: config.start_price,
            forming: None,
            ticks: 0,
        }
    }

    fn lock(walks: &Mutex<HashMap<String, WalkState>>) -> Result<MutexGuard<'_, HashMap<String, WalkState>>, SourceError> {
        walks
            .lock()
            .map_err(|_| SourceError::Network("simulated feed state poisoned".to_string()))
    }

    /// Next update of the forming candle; rolls to a new bucket after
    /// `ticks_per_candle` ticks
    fn tick(
        walks: &Mutex<HashMap<String, WalkState>>,
        config: &SimulatedConfig,
        symbol: &str,
        interval: Interval,
    ) -> Result<Candle, SourceError> {
        let mut walks = Self::lock(walks)?;
        let s = walks
            .entry(symbol.to_string())
            .or_insert_with(|| Self::new_walk(config, symbol));
        let rollover = s.ticks >= config.ticks_per_candle.max(1);
        let mut candle = match s.forming.take() {
            Some(prev) if rollover => {
                s.ticks = 0;
                let open = prev.close;
                let start = prev.open_time + interval.duration();
                Candle::with_interval(start, interval, open, open, open, open, 0.0)
            }
            Some(prev) => prev,
            None => {
                let open = s.price;
                let start = bucket_start(Utc::now(), interval);
                Candle::with_interval(start, interval, open, open, open, open, 0.0)
            }
        };
        let price = s.step(config.volatility);
        candle.close = price;
        candle.high = candle.high.max(price);
        candle.low = candle.low.min(price);
        candle.volume += s.volume();
        s.ticks += 1;
        s.forming = Some(candle.clone());
        Ok(candle)
    }
}

impl Default for SimulatedFeed {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

#[async_trait]
impl CandleFeed for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    fn health(&self) -> SourceHealth {
        SourceHealth::DegradedSimulated
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, SourceError> {
        let mut walks = Self::lock(&self.walks)?;
        let s = walks
            .entry(symbol.to_string())
            .or_insert_with(|| Self::new_walk(&self.config, symbol));
        if let Some(forming) = &s.forming {
            // Already streaming this symbol: the forming candle is the latest
            return Ok(if limit == 0 { Vec::new() } else { vec![forming.clone()] });
        }

        let current = bucket_start(Utc::now(), interval);
        let mut candles = Vec::with_capacity(limit);
        for i in (1..=limit as i32).rev() {
            let open_time = current - interval.duration() * i;
            let open = s.price;
            let mut high = open;
            let mut low = open;
            for _ in 0..4 {
                let p = s.step(self.config.volatility);
                high = high.max(p);
                low = low.min(p);
            }
            let close = s.price;
            let volume = s.volume() * 10.0;
            candles.push(Candle::with_interval(open_time, interval, open, high, low, close, volume));
        }
        Ok(candles)
    }

    async fn subscribe(&self, symbol: &str, interval: Interval) -> Result<CandleStream, SourceError> {
        let walks = self.walks.clone();
        let config = self.config.clone();
        let symbol = symbol.to_string();
        let ticks = stream::unfold((), move |()| {
            let walks = walks.clone();
            let config = config.clone();
            let symbol = symbol.clone();
            async move {
                tokio::time::sleep(config.tick_every).await;
                Some((Self::tick(&walks, &config, &symbol, interval), ()))
            }
        });
        Ok(Box::pin(ticks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_history_is_seeded_and_valid() {
        let a = SimulatedFeed::default();
        let b = SimulatedFeed::default();
        let ha = a.fetch_history("BTCUSDT", Interval::OneMinute, 50).await.unwrap();
        let hb = b.fetch_history("BTCUSDT", Interval::OneMinute, 50).await.unwrap();

        assert_eq!(ha.len(), 50);
        assert!(ha.iter().all(Candle::is_valid));
        assert!(ha.windows(2).all(|w| w[0].open_time < w[1].open_time));
        let closes_a: Vec<f64> = ha.iter().map(|c| c.close).collect();
        let closes_b: Vec<f64> = hb.iter().map(|c| c.close).collect();
        assert_eq!(closes_a, closes_b);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_reticks_then_rolls_over() {
        let feed = SimulatedFeed::new(SimulatedConfig {
            ticks_per_candle: 3,
            ..SimulatedConfig::default()
        });
        let history = feed.fetch_history("X", Interval::OneMinute, 5).await.unwrap();
        let mut stream = feed.subscribe("X", Interval::OneMinute).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(stream.next().await.unwrap().unwrap());
        }
        assert!(seen.iter().all(Candle::is_valid));
        assert_eq!(seen[0].open_time, seen[2].open_time);
        assert_eq!(seen[3].open_time, seen[0].open_time + chrono::Duration::minutes(1));
        assert!(seen[0].open_time > history.last().unwrap().open_time);
        assert_eq!(feed.health(), SourceHealth::DegradedSimulated);
    }
}
