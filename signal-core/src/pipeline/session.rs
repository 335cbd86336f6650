//! One (symbol, interval) session: store, compute pipeline and stabilizer
//! state, created on switch and dropped on teardown.

use crate::alerts::{DispatchOutcome, NotificationDispatcher};
use crate::config::PipelineConfig;
use crate::data::{is_significant, Candle, CandleStore, Interval, UpdateKind};
use crate::indicators::IndicatorEngine;
use crate::strategy::{
    HoldReason, MarketRegime, MarketRegimeDetector, Signal, SignalStabilizer, SignalSynthesizer,
    SignalValidator,
};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Result of one compute pass
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutput {
    pub symbol: String,
    pub interval: Interval,
    /// Synthesizer output before stabilization
    pub raw: Signal,
    /// What consumers should act on
    pub signal: Signal,
    pub hold_reason: Option<HoldReason>,
    pub regime: MarketRegime,
    pub dispatch: Option<DispatchOutcome>,
}

pub struct SignalSession {
    store: CandleStore,
    engine: IndicatorEngine,
    synthesizer: SignalSynthesizer,
    stabilizer: SignalStabilizer,
    dispatcher: Option<NotificationDispatcher>,
    significance_epsilon: f64,
    max_skipped_updates: usize,
    skipped: usize,
}

impl SignalSession {
    pub fn new(symbol: &str, interval: Interval, config: &PipelineConfig) -> Self {
        Self {
            store: CandleStore::new(symbol, interval, config.store.capacity),
            engine: IndicatorEngine::new(config.indicators.clone()),
            synthesizer: SignalSynthesizer::new(config.synthesizer.clone()),
            stabilizer: SignalStabilizer::new(
                config.stabilizer.clone(),
                MarketRegimeDetector::new(config.regime.clone()),
            ),
            dispatcher: None,
            significance_epsilon: config.store.significance_epsilon,
            max_skipped_updates: config.store.max_skipped_updates,
            skipped: 0,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: SignalSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn symbol(&self) -> &str {
        self.store.symbol()
    }

    pub fn interval(&self) -> Interval {
        self.store.interval()
    }

    pub fn store(&self) -> &CandleStore {
        &self.store
    }

    pub fn stabilizer(&self) -> &SignalStabilizer {
        &self.stabilizer
    }

    /// Load history and compute once on the result
    pub fn backfill(&mut self, candles: Vec<Candle>, now: DateTime<Utc>) -> Option<SessionOutput> {
        let count = self.store.extend(candles);
        debug!(symbol = %self.store.symbol(), count, stored = self.store.len(), "Backfill applied");
        if self.store.is_empty() {
            return None;
        }
        self.skipped = 0;
        Some(self.evaluate(now))
    }

    /// Apply one live candle; recompute only on a significant change, or
    /// after too many insignificant ones in a row
    pub fn on_candle(&mut self, candle: Candle, now: DateTime<Utc>) -> Option<SessionOutput> {
        let significant = is_significant(self.store.find(&candle), &candle, self.significance_epsilon);
        if self.store.update(candle) == UpdateKind::Stale {
            return None;
        }

        if !significant {
            self.skipped += 1;
            if self.skipped < self.max_skipped_updates {
                debug!(symbol = %self.store.symbol(), skipped = self.skipped, "Insignificant update, skipping recompute");
                return None;
            }
        }
        self.skipped = 0;
        Some(self.evaluate(now))
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> SessionOutput {
        let series = self.store.snapshot();
        let snapshot = self.engine.compute(&series);
        let mut raw = self.synthesizer.synthesize(&series, &snapshot);
        if let Err(e) = SignalValidator::validate(&raw) {
            warn!(symbol = %self.store.symbol(), error = %e, "Discarding invalid synthesized signal");
            raw = Signal::neutral(0.0, raw.time);
        }

        let decision = self.stabilizer.process(&raw, series.candles(), now);
        let dispatch = match (&mut self.dispatcher, decision.is_actionable()) {
            (Some(dispatcher), true) => Some(dispatcher.dispatch(&decision.signal, &decision.regime, now)),
            _ => None,
        };

        SessionOutput {
            symbol: self.store.symbol().to_string(),
            interval: self.store.interval(),
            raw,
            signal: decision.signal,
            hold_reason: decision.hold_reason,
            regime: decision.regime,
            dispatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SignalType;
    use chrono::{Duration, TimeZone};

    fn candle(minute: i64, close: f64) -> Candle {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
        Candle::with_interval(t, Interval::OneMinute, close, close + 0.5, close - 0.5, close, 10.0)
    }

    fn session() -> SignalSession {
        SignalSession::new("btcusdt", Interval::OneMinute, &PipelineConfig::default())
    }

    #[test]
    fn test_backfill_computes_once() {
        let mut s = session();
        let history: Vec<Candle> = (0..60).map(|m| candle(m, 100.0 + (m as f64 * 0.3).sin())).collect();
        let out = s.backfill(history, Utc::now()).unwrap();
        assert_eq!(s.store().len(), 60);
        assert_eq!(out.symbol, "BTCUSDT");
        assert_eq!(out.raw.time, s.store().latest().unwrap().open_time);
    }

    #[test]
    fn test_insignificant_ticks_skip_until_forced() {
        let mut s = session();
        s.backfill(vec![candle(0, 100.0)], Utc::now());
        // ten re-ticks within epsilon; the tenth is forced through
        let mut computed = 0;
        for i in 0..10 {
            if s.on_candle(candle(0, 100.0 + i as f64 * 0.0001), Utc::now()).is_some() {
                computed += 1;
            }
        }
        assert_eq!(computed, 1);
        assert_eq!(s.store().len(), 1);
    }

    #[test]
    fn test_new_bucket_always_recomputes() {
        let mut s = session();
        s.backfill(vec![candle(0, 100.0)], Utc::now());
        assert!(s.on_candle(candle(1, 100.0), Utc::now()).is_some());
    }

    #[test]
    fn test_short_history_holds() {
        let mut s = session();
        let out = s.backfill(vec![candle(0, 100.0), candle(1, 100.1)], Utc::now()).unwrap();
        assert_eq!(out.signal.signal_type, SignalType::Hold);
        assert!(out.dispatch.is_none());
    }
}
