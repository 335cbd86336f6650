//! Reconnect backoff and manual-refresh gating

use crate::config::BackoffConfig;
use std::time::Duration;
use tokio::time::Instant;

/// Exponential backoff: `min(base * multiplier^n, max)` for the n-th retry
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Failed attempts since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.config.max_attempts
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let c = &self.config;
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = c.base_delay_ms as f64 * c.multiplier.max(1.0).powi(exponent);
        let capped = if raw.is_finite() {
            raw.min(c.max_delay_ms as f64)
        } else {
            c.max_delay_ms as f64
        };
        Duration::from_millis(capped as u64)
    }

    /// Record a failure; `None` once the attempt budget is spent
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let delay = self.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accepted,
    Throttled,
}

/// Throttle for manual refreshes; the quiet-period debounce is applied by the
/// connection task that executes them
#[derive(Debug, Clone)]
pub struct RefreshGate {
    debounce: Duration,
    throttle: Duration,
    last_accepted: Option<Instant>,
}

impl RefreshGate {
    pub fn new(debounce: Duration, throttle: Duration) -> Self {
        Self {
            debounce,
            throttle,
            last_accepted: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn check(&mut self, now: Instant) -> GateDecision {
        match self.last_accepted {
            Some(last) if now.duration_since(last) < self.throttle => GateDecision::Throttled,
            _ => {
                self.last_accepted = Some(now);
                GateDecision::Accepted
            }
        }
    }
}
