//! Message-passing driver: owns the market data source and the current
//! session, reacts to commands and turns source events into signals.

use crate::alerts::{AlertSink, NotificationDispatcher};
use crate::config::PipelineConfig;
use crate::data::Interval;
use crate::pipeline::{SessionOutput, SignalSession};
use crate::source::{ConnectionHandle, MarketDataSource, SourceEvent, SourceStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PipelineCommand {
    /// Tear down the current session and start a new one
    Switch { symbol: String, interval: Interval },
    Refresh,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Signal(SessionOutput),
    Status(SourceStatus),
}

pub struct PipelineRunner {
    config: PipelineConfig,
    source: MarketDataSource,
    sink: Option<Arc<dyn AlertSink>>,
    events: mpsc::Sender<PipelineEvent>,
}

struct ActiveSession {
    handle: ConnectionHandle,
    session: SignalSession,
    source_events: mpsc::Receiver<SourceEvent>,
}

async fn next_source_event(active: &mut Option<ActiveSession>) -> Option<SourceEvent> {
    match active {
        Some(active) => active.source_events.recv().await,
        None => std::future::pending().await,
    }
}

impl PipelineRunner {
    pub fn new(config: PipelineConfig, source: MarketDataSource, events: mpsc::Sender<PipelineEvent>) -> Self {
        Self {
            config,
            source,
            sink: None,
            events,
        }
    }

    /// Deliver actionable signals through `sink`
    pub fn with_alerts(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Run until `Stop`, until the command channel closes, or until the
    /// event consumer goes away
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) -> crate::Result<()> {
        let mut active: Option<ActiveSession> = None;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PipelineCommand::Switch { symbol, interval }) => {
                        self.end_session(&mut active);
                        active = self.start_session(&symbol, interval);
                    }
                    Some(PipelineCommand::Refresh) => {
                        let outcome = self.source.refresh_now();
                        debug!(?outcome, "Manual refresh requested");
                    }
                    Some(PipelineCommand::Stop) | None => {
                        info!("Stopping pipeline");
                        self.end_session(&mut active);
                        break;
                    }
                },
                event = next_source_event(&mut active) => {
                    let Some(event) = event else {
                        warn!("Source connection task ended");
                        self.end_session(&mut active);
                        continue;
                    };
                    if !self.handle_source_event(&mut active, event).await {
                        info!("Pipeline event consumer dropped, stopping");
                        self.end_session(&mut active);
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn start_session(&mut self, symbol: &str, interval: Interval) -> Option<ActiveSession> {
        let (tx, rx) = mpsc::channel(self.config.source.channel_capacity.max(1));
        let handle = match self.source.connect(symbol, interval, tx) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(symbol, %interval, error = %e, "Could not start session");
                return None;
            }
        };

        let mut session = SignalSession::new(&handle.symbol, interval, &self.config);
        if let Some(sink) = &self.sink {
            session = session.with_dispatcher(NotificationDispatcher::new(
                self.config.alerts.clone(),
                &handle.symbol,
                sink.clone(),
            ));
        }
        info!(symbol = %handle.symbol, %interval, "Session started");
        Some(ActiveSession {
            handle,
            session,
            source_events: rx,
        })
    }

    /// Cancels the connection task (and any pending reconnect timer) before
    /// the session state is dropped
    fn end_session(&mut self, active: &mut Option<ActiveSession>) {
        if let Some(previous) = active.take() {
            self.source.disconnect(&previous.handle);
            info!(symbol = %previous.handle.symbol, interval = %previous.handle.interval, "Session ended");
        }
    }

    /// `false` once the event consumer is gone
    async fn handle_source_event(&mut self, active: &mut Option<ActiveSession>, event: SourceEvent) -> bool {
        let Some(current) = active.as_mut() else {
            return true;
        };
        let output = match event {
            SourceEvent::Status(status) => {
                return self.events.send(PipelineEvent::Status(status)).await.is_ok();
            }
            SourceEvent::Backfill(candles) => current.session.backfill(candles, Utc::now()),
            SourceEvent::Candle(candle) => current.session.on_candle(candle, Utc::now()),
        };
        match output {
            Some(output) => self.events.send(PipelineEvent::Signal(output)).await.is_ok(),
            None => true,
        }
    }
}
