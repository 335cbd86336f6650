//! Alert delivery configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Signals below this confidence (0..=100) never alert
    pub confidence_threshold: f64,
    /// Sound playback
    pub alerts_enabled: bool,
    /// 0.0..=1.0
    pub alert_volume: f64,
    /// OS notifications
    pub notifications_enabled: bool,
    /// Minimum gap between toasts; sound and OS notifications are exempt
    pub toast_interval_ms: u64,
    /// Suppress an alert if the opposite direction fired within this window
    pub opposite_window_trending_ms: u64,
    pub opposite_window_volatile_ms: u64,
    pub opposite_window_default_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 70.0,
            alerts_enabled: true,
            alert_volume: 0.5,
            notifications_enabled: true,
            toast_interval_ms: 5_000,
            opposite_window_trending_ms: 200_000,
            opposite_window_volatile_ms: 450_000,
            opposite_window_default_ms: 300_000,
        }
    }
}
