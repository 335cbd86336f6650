//! Connection lifecycle for one (symbol, interval) subscription.
//!
//! `connect` spawns a task that backfills, then follows the feed (push
//! stream or polling), reconnecting with exponential backoff. Switching keys
//! tears the previous task down before the new one starts, so a pending
//! reconnect timer can never revive a stale session.

use crate::config::SourceConfig;
use crate::data::{Candle, Interval};
use crate::error::SourceError;
use crate::source::{
    Backoff, CandleFeed, ConnectionState, FeedMode, GateDecision, RefreshGate, SourceEvent,
    SourceHealth, SourceStatus,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub symbol: String,
    pub interval: Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Scheduled,
    /// A backfill or refresh fetch is still running
    Busy,
    Throttled,
    NotConnected,
}

#[derive(Debug)]
struct ActiveConnection {
    handle: ConnectionHandle,
    in_flight: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    refresh: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

pub struct MarketDataSource {
    primary: Arc<dyn CandleFeed>,
    fallback: Option<Arc<dyn CandleFeed>>,
    config: SourceConfig,
    status: watch::Sender<SourceStatus>,
    gate: RefreshGate,
    active: Option<ActiveConnection>,
}

impl MarketDataSource {
    pub fn new(primary: Arc<dyn CandleFeed>, config: SourceConfig) -> Self {
        let (status, _) = watch::channel(SourceStatus::disconnected());
        let gate = RefreshGate::new(ms(config.refresh_debounce_ms), ms(config.refresh_throttle_ms));
        Self {
            primary,
            fallback: None,
            config,
            status,
            gate,
            active: None,
        }
    }

    /// Feed used once the primary exhausts its retry budget
    pub fn with_fallback(mut self, feed: Arc<dyn CandleFeed>) -> Self {
        self.fallback = Some(feed);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn status(&self) -> watch::Receiver<SourceStatus> {
        self.status.subscribe()
    }

    pub fn current(&self) -> Option<&ConnectionHandle> {
        self.active.as_ref().map(|a| &a.handle)
    }

    pub fn is_in_flight(&self) -> bool {
        self.active
            .as_ref()
            .map_or(false, |a| a.in_flight.load(Ordering::Acquire))
    }

    /// Start following `symbol`/`interval`, delivering backfill, live
    /// candles and status transitions on `events`.
    ///
    /// Returns `SourceError::Busy` when the same key is still fetching.
    /// `PipelineRunner` disconnects before every switch, so only direct
    /// callers can hit that guard.
    pub fn connect(
        &mut self,
        symbol: &str,
        interval: Interval,
        events: mpsc::Sender<SourceEvent>,
    ) -> Result<ConnectionHandle, SourceError> {
        let symbol = symbol.to_uppercase();
        if let Some(active) = &self.active {
            let same_key = active.handle.symbol == symbol && active.handle.interval == interval;
            if same_key && active.in_flight.load(Ordering::Acquire) {
                return Err(SourceError::Busy(symbol));
            }
        }
        self.teardown();

        let handle = ConnectionHandle {
            id: Uuid::new_v4(),
            symbol: symbol.clone(),
            interval,
        };
        let in_flight = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (refresh_tx, refresh_rx) = mpsc::channel(4);

        let task = ConnectionTask {
            symbol,
            interval,
            feed: self.primary.clone(),
            fallback: self.fallback.clone(),
            config: self.config.clone(),
            debounce: self.gate.debounce(),
            in_flight: in_flight.clone(),
            status: self.status.clone(),
            events,
            shutdown: shutdown_rx,
            refresh: refresh_rx,
        };
        info!(
            symbol = %handle.symbol,
            interval = %interval,
            feed = self.primary.name(),
            connection = %handle.id,
            "Connecting market data"
        );
        let join = tokio::spawn(task.run());

        self.active = Some(ActiveConnection {
            handle: handle.clone(),
            in_flight,
            shutdown: shutdown_tx,
            refresh: refresh_tx,
            task: join,
        });
        Ok(handle)
    }

    /// Close `handle` if it is the current connection
    pub fn disconnect(&mut self, handle: &ConnectionHandle) -> bool {
        let current = self.active.as_ref().map(|a| a.handle.id);
        if current != Some(handle.id) {
            return false;
        }
        self.teardown().is_some()
    }

    /// Re-fetch the latest candles now (debounced by the connection task,
    /// throttled here); re-arms a connection that reported unavailable
    pub fn refresh_now(&mut self) -> RefreshOutcome {
        let Some(active) = &self.active else {
            return RefreshOutcome::NotConnected;
        };
        if active.in_flight.load(Ordering::Acquire) {
            return RefreshOutcome::Busy;
        }
        if self.gate.check(Instant::now()) == GateDecision::Throttled {
            debug!("Refresh throttled");
            return RefreshOutcome::Throttled;
        }
        match active.refresh.try_send(()) {
            Ok(()) | Err(TrySendError::Full(_)) => RefreshOutcome::Scheduled,
            Err(TrySendError::Closed(_)) => RefreshOutcome::NotConnected,
        }
    }

    fn teardown(&mut self) -> Option<ConnectionHandle> {
        let active = self.active.take()?;
        let _ = active.shutdown.send(true);
        active.task.abort();

        let previous = self.status.borrow().clone();
        self.status.send_replace(SourceStatus {
            state: ConnectionState::Closed,
            ..previous
        });
        info!(
            symbol = %active.handle.symbol,
            interval = %active.handle.interval,
            connection = %active.handle.id,
            "Market data connection closed"
        );
        Some(active.handle)
    }
}

impl Drop for MarketDataSource {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

enum Wake {
    Elapsed,
    Refresh,
    Shutdown,
}

struct ConnectionTask {
    symbol: String,
    interval: Interval,
    feed: Arc<dyn CandleFeed>,
    fallback: Option<Arc<dyn CandleFeed>>,
    config: SourceConfig,
    debounce: Duration,
    in_flight: Arc<AtomicBool>,
    status: watch::Sender<SourceStatus>,
    events: mpsc::Sender<SourceEvent>,
    shutdown: watch::Receiver<bool>,
    refresh: mpsc::Receiver<()>,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut backoff = Backoff::new(self.config.backoff.clone());
        loop {
            if !self.publish(ConnectionState::Connecting).await {
                break;
            }
            let err = match self.session(&mut backoff).await {
                Ok(()) => break,
                Err(err) => err,
            };
            self.in_flight.store(false, Ordering::Release);
            warn!(
                symbol = %self.symbol,
                feed = self.feed.name(),
                error = %err,
                attempt = backoff.attempt() + 1,
                "Market data connection failed"
            );

            if let Some(delay) = backoff.next_delay() {
                let state = ConnectionState::Reconnecting {
                    attempt: backoff.attempt(),
                    delay_ms: delay.as_millis() as u64,
                };
                if !self.publish(state).await {
                    break;
                }
                match self.wait(Some(delay)).await {
                    Wake::Shutdown => break,
                    Wake::Refresh => backoff.reset(),
                    Wake::Elapsed => {}
                }
                continue;
            }

            if let Some(fallback) = self.fallback.take() {
                warn!(
                    symbol = %self.symbol,
                    feed = fallback.name(),
                    "Primary feed unavailable, falling back to simulated data"
                );
                self.feed = fallback;
                backoff.reset();
                continue;
            }

            error!(
                symbol = %self.symbol,
                feed = self.feed.name(),
                attempts = backoff.attempt(),
                "Market data unavailable, waiting for manual refresh"
            );
            if !self.publish(ConnectionState::Unavailable).await {
                break;
            }
            match self.wait(None).await {
                Wake::Shutdown => break,
                Wake::Refresh | Wake::Elapsed => backoff.reset(),
            }
        }
        self.in_flight.store(false, Ordering::Release);
    }

    /// One connection attempt. `Ok` means the session ended on purpose
    /// (shutdown or the consumer went away).
    async fn session(&mut self, backoff: &mut Backoff) -> Result<(), SourceError> {
        let history = self.fetch(self.config.backfill_limit).await?;
        backoff.reset();
        info!(
            symbol = %self.symbol,
            interval = %self.interval,
            feed = self.feed.name(),
            candles = history.len(),
            "Backfill complete"
        );
        if !self.publish(ConnectionState::Connected).await || !self.forward_backfill(history).await {
            return Ok(());
        }

        match self.feed.mode() {
            FeedMode::Push => self.follow_stream().await,
            FeedMode::Poll { every } => self.follow_poll(every).await,
        }
    }

    async fn follow_stream(&mut self) -> Result<(), SourceError> {
        let mut stream = self.feed.subscribe(&self.symbol, self.interval).await?;
        let stale = ms(self.config.stale_timeout_ms);
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return Ok(()),
                Some(()) = self.refresh.recv() => {
                    if !self.refresh_latest().await? {
                        return Ok(());
                    }
                }
                next = tokio::time::timeout(stale, stream.next()) => match next {
                    Err(_) => return Err(SourceError::Timeout(stale)),
                    Ok(None) => return Err(SourceError::Closed),
                    Ok(Some(Err(SourceError::Parse(reason)))) => {
                        warn!(symbol = %self.symbol, %reason, "Dropping malformed payload");
                    }
                    Ok(Some(Err(err))) => return Err(err),
                    Ok(Some(Ok(candle))) => {
                        if !self.forward(candle).await {
                            return Ok(());
                        }
                    }
                },
            }
        }
    }

    async fn follow_poll(&mut self, every: Duration) -> Result<(), SourceError> {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the backfill already ran
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return Ok(()),
                Some(()) = self.refresh.recv() => {
                    if !self.refresh_latest().await? {
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    let latest = self.fetch(self.config.poll_limit).await?;
                    if !self.forward_all(latest).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Debounced manual refresh; `false` if the consumer is gone
    async fn refresh_latest(&mut self) -> Result<bool, SourceError> {
        while let Ok(Some(())) = tokio::time::timeout(self.debounce, self.refresh.recv()).await {}
        let latest = self.fetch(self.config.poll_limit).await?;
        debug!(symbol = %self.symbol, candles = latest.len(), "Manual refresh");
        Ok(self.forward_all(latest).await)
    }

    async fn fetch(&mut self, limit: usize) -> Result<Vec<Candle>, SourceError> {
        let stale = ms(self.config.stale_timeout_ms);
        self.in_flight.store(true, Ordering::Release);
        let result = tokio::time::timeout(stale, self.feed.fetch_history(&self.symbol, self.interval, limit)).await;
        self.in_flight.store(false, Ordering::Release);
        result.map_err(|_| SourceError::Timeout(stale))?
    }

    async fn forward_backfill(&mut self, candles: Vec<Candle>) -> bool {
        let total = candles.len();
        let valid: Vec<Candle> = candles.into_iter().filter(Candle::is_valid).collect();
        if valid.len() < total {
            warn!(
                symbol = %self.symbol,
                dropped = total - valid.len(),
                "Dropping malformed candles from backfill"
            );
        }
        self.events.send(SourceEvent::Backfill(valid)).await.is_ok()
    }

    async fn forward_all(&mut self, candles: Vec<Candle>) -> bool {
        for candle in candles {
            if !self.forward(candle).await {
                return false;
            }
        }
        true
    }

    async fn forward(&mut self, candle: Candle) -> bool {
        if !candle.is_valid() {
            warn!(
                symbol = %self.symbol,
                open_time = %candle.open_time,
                open = candle.open,
                high = candle.high,
                low = candle.low,
                close = candle.close,
                "Dropping malformed candle"
            );
            return true;
        }
        self.events.send(SourceEvent::Candle(candle)).await.is_ok()
    }

    /// Update the status watch and notify the consumer; `false` if the
    /// consumer is gone
    async fn publish(&mut self, state: ConnectionState) -> bool {
        let health = match state {
            ConnectionState::Connecting | ConnectionState::Connected => self.feed.health(),
            _ => SourceHealth::Retrying,
        };
        let status = SourceStatus {
            state,
            health,
            feed: self.feed.name().to_string(),
        };
        debug!(symbol = %self.symbol, status = %status, "Source status");
        self.status.send_replace(status.clone());
        self.events.send(SourceEvent::Status(status)).await.is_ok()
    }

    async fn wait(&mut self, delay: Option<Duration>) -> Wake {
        let sleep = async {
            match delay {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = self.shutdown.changed() => Wake::Shutdown,
            request = self.refresh.recv() => match request {
                Some(()) => Wake::Refresh,
                None => Wake::Shutdown,
            },
            _ = sleep => Wake::Elapsed,
        }
    }
}
