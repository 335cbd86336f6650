//! Notification dispatcher: thresholding, opposite-direction suppression and
//! toast rate limiting in front of an `AlertSink`.

use crate::alerts::{AlertSink, ToastSeverity};
use crate::config::AlertConfig;
use crate::strategy::{MarketRegime, RegimeKind, Signal, SignalType};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotActionable,
    BelowThreshold,
    OppositeRecent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    Delivered {
        sound: bool,
        os_notification: bool,
        toast: bool,
    },
}

#[derive(Debug)]
pub struct NotificationDispatcher {
    config: AlertConfig,
    symbol: String,
    sink: Arc<dyn AlertSink>,
    last_alert: HashMap<SignalType, DateTime<Utc>>,
    last_toast: Option<DateTime<Utc>>,
}

impl NotificationDispatcher {
    pub fn new(config: AlertConfig, symbol: &str, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            symbol: symbol.to_uppercase(),
            sink,
            last_alert: HashMap::new(),
            last_toast: None,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    fn opposite_window(&self, regime: &MarketRegime) -> Duration {
        let ms = match regime.kind {
            RegimeKind::Trending => self.config.opposite_window_trending_ms,
            RegimeKind::Volatile => self.config.opposite_window_volatile_ms,
            _ => self.config.opposite_window_default_ms,
        };
        Duration::milliseconds(ms as i64)
    }

    pub fn dispatch(&mut self, signal: &Signal, regime: &MarketRegime, now: DateTime<Utc>) -> DispatchOutcome {
        let direction = signal.signal_type;
        let Some(opposite) = direction.opposite() else {
            return DispatchOutcome::Skipped(SkipReason::NotActionable);
        };
        if signal.confidence < self.config.confidence_threshold {
            debug!(confidence = signal.confidence, threshold = self.config.confidence_threshold, "Alert below threshold");
            return DispatchOutcome::Skipped(SkipReason::BelowThreshold);
        }
        if let Some(fired) = self.last_alert.get(&opposite) {
            if now - *fired < self.opposite_window(regime) {
                debug!(%direction, "Opposite alert fired recently, suppressing");
                return DispatchOutcome::Skipped(SkipReason::OppositeRecent);
            }
        }

        let title = format!("{} {}", direction, self.symbol);
        let mut body = format!("{} signal, confidence {:.0}%", direction, signal.confidence);
        if let Some(t) = signal.price_targets {
            body.push_str(&format!(
                " | entry {:.4} stop {:.4} target {:.4}",
                t.entry, t.stop_loss, t.target1
            ));
        }

        let sound = self.config.alerts_enabled;
        if sound {
            self.sink.play_sound(direction, self.config.alert_volume.clamp(0.0, 1.0));
        }
        let os_notification = self.config.notifications_enabled;
        if os_notification {
            let icon = if direction == SignalType::Buy { "buy" } else { "sell" };
            self.sink.show_os_notification(&title, &body, icon);
        }

        let interval = Duration::milliseconds(self.config.toast_interval_ms as i64);
        let toast = self.last_toast.map_or(true, |t| now - t >= interval);
        if toast {
            let severity = if direction == SignalType::Buy {
                ToastSeverity::Success
            } else {
                ToastSeverity::Warning
            };
            self.sink.show_toast(&title, &body, severity);
            self.last_toast = Some(now);
        }

        self.last_alert.insert(direction, now);
        DispatchOutcome::Delivered {
            sound,
            os_notification,
            toast,
        }
    }
}
