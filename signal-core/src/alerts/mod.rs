//! Alert delivery for actionable signals

pub mod dispatcher;

pub use dispatcher::*;

use crate::strategy::SignalType;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastSeverity {
    Success,
    Warning,
    Info,
}

/// Fire-and-forget alert primitives provided by the host (desktop shell,
/// terminal, chat bot)
pub trait AlertSink: Send + Sync + Debug {
    fn play_sound(&self, direction: SignalType, volume: f64);

    fn show_os_notification(&self, title: &str, body: &str, icon: &str);

    fn show_toast(&self, title: &str, description: &str, severity: ToastSeverity);
}

/// Sink that renders every alert as a structured log event
#[derive(Debug, Default, Clone)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn play_sound(&self, direction: SignalType, volume: f64) {
        info!(target: "alerts", %direction, volume, "🔔 Sound alert");
    }

    fn show_os_notification(&self, title: &str, body: &str, icon: &str) {
        info!(target: "alerts", title, body, icon, "Notification");
    }

    fn show_toast(&self, title: &str, description: &str, severity: ToastSeverity) {
        info!(target: "alerts", title, description, ?severity, "Toast");
    }
}
