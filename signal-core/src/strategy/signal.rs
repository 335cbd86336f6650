//! Signal types shared by the synthesizer, stabilizer and dispatcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    /// Buy/Long signal
    Buy,
    /// Sell/Short signal
    Sell,
    /// Explicit no-action, usually emitted by the stabilizer
    Hold,
    /// Indicators disagree or are too weak to call a direction
    Neutral,
}

impl SignalType {
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }

    /// BUY <-> SELL; `None` for HOLD/NEUTRAL
    pub fn opposite(&self) -> Option<Self> {
        match self {
            Self::Buy => Some(Self::Sell),
            Self::Sell => Some(Self::Buy),
            Self::Hold | Self::Neutral => None,
        }
    }

    pub fn is_opposite_of(&self, other: SignalType) -> bool {
        self.opposite() == Some(other)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
            Self::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Direction a single vote leans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDirection {
    Bullish,
    Bearish,
    Neutral,
}

impl VoteDirection {
    pub fn signal_type(&self) -> SignalType {
        match self {
            Self::Bullish => SignalType::Buy,
            Self::Bearish => SignalType::Sell,
            Self::Neutral => SignalType::Neutral,
        }
    }
}

/// Where a vote comes from; composite and pattern votes rank first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoteKind {
    Composite,
    Pattern,
    Indicator,
}

/// One indicator's or pattern's contribution to a synthesized signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalVote {
    pub source: String,
    pub kind: VoteKind,
    pub direction: VoteDirection,
    /// 0..=100
    pub strength: f64,
    pub message: String,
}

impl SignalVote {
    pub fn new(
        source: impl Into<String>,
        kind: VoteKind,
        direction: VoteDirection,
        strength: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            kind,
            direction,
            strength: strength.clamp(0.0, 100.0),
            message: message.into(),
        }
    }

    pub fn indicator(
        source: impl Into<String>,
        direction: VoteDirection,
        strength: f64,
        message: impl Into<String>,
    ) -> Self {
        Self::new(source, VoteKind::Indicator, direction, strength, message)
    }
}

/// Sort votes for display: composite/pattern first, then by strength
pub fn order_votes(votes: &mut [SignalVote]) {
    votes.sort_by(|a, b| {
        a.kind
            .cmp(&b.kind)
            .then_with(|| b.strength.total_cmp(&a.strength))
    });
}

/// Entry, stop and three targets for an actionable signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceTargets {
    pub entry: f64,
    pub stop_loss: f64,
    pub target1: f64,
    pub target2: f64,
    pub target3: f64,
    pub risk_reward_ratio: f64,
}

/// Trading signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Signal type
    pub signal_type: SignalType,
    /// Confidence level (0 to 100)
    pub confidence: f64,
    /// Ordered explanation of the aggregate
    pub contributing: Vec<SignalVote>,
    /// Present only for BUY/SELL
    pub price_targets: Option<PriceTargets>,
    /// Open time of the candle the signal was computed on
    pub time: DateTime<Utc>,
}

impl Signal {
    pub fn new(signal_type: SignalType, confidence: f64, time: DateTime<Utc>) -> Self {
        Self {
            signal_type,
            confidence: confidence.clamp(0.0, 100.0),
            contributing: Vec::new(),
            price_targets: None,
            time,
        }
    }

    /// Create buy signal
    pub fn buy(confidence: f64, time: DateTime<Utc>) -> Self {
        Self::new(SignalType::Buy, confidence, time)
    }

    /// Create sell signal
    pub fn sell(confidence: f64, time: DateTime<Utc>) -> Self {
        Self::new(SignalType::Sell, confidence, time)
    }

    /// Create hold signal
    pub fn hold(confidence: f64, time: DateTime<Utc>) -> Self {
        Self::new(SignalType::Hold, confidence, time)
    }

    pub fn neutral(confidence: f64, time: DateTime<Utc>) -> Self {
        Self::new(SignalType::Neutral, confidence, time)
    }

    pub fn with_votes(mut self, mut votes: Vec<SignalVote>) -> Self {
        order_votes(&mut votes);
        self.contributing = votes;
        self
    }

    /// Attach targets; ignored unless the signal is BUY/SELL
    pub fn with_targets(mut self, targets: Option<PriceTargets>) -> Self {
        if self.signal_type.is_actionable() {
            self.price_targets = targets;
        }
        self
    }

    /// Same explanation, demoted to HOLD with capped confidence
    pub fn into_hold(mut self, confidence_cap: f64) -> Self {
        self.signal_type = SignalType::Hold;
        self.confidence = self.confidence.min(confidence_cap);
        self.price_targets = None;
        self
    }
}

/// Post-stabilization record kept for consistency checks and replay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalHistoryEntry {
    /// What the stabilizer emitted
    pub signal_type: SignalType,
    /// What the synthesizer proposed
    pub raw_type: SignalType,
    pub time: DateTime<Utc>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_ordering() {
        let mut votes = vec![
            SignalVote::indicator("RSI", VoteDirection::Bullish, 40.0, "weak"),
            SignalVote::indicator("MACD", VoteDirection::Bullish, 80.0, "cross"),
            SignalVote::new("Engulfing", VoteKind::Pattern, VoteDirection::Bullish, 20.0, "p"),
            SignalVote::new("Confluence", VoteKind::Composite, VoteDirection::Bullish, 10.0, "c"),
        ];
        order_votes(&mut votes);
        let sources: Vec<&str> = votes.iter().map(|v| v.source.as_str()).collect();
        assert_eq!(sources, vec!["Confluence", "Engulfing", "MACD", "RSI"]);
    }

    #[test]
    fn test_targets_only_for_actionable() {
        let t = PriceTargets {
            entry: 100.0,
            stop_loss: 95.0,
            target1: 105.0,
            target2: 110.0,
            target3: 115.0,
            risk_reward_ratio: 1.0,
        };
        let now = Utc::now();
        assert!(Signal::buy(70.0, now).with_targets(Some(t)).price_targets.is_some());
        assert!(Signal::neutral(10.0, now).with_targets(Some(t)).price_targets.is_none());
        let held = Signal::buy(90.0, now).with_targets(Some(t)).into_hold(70.0);
        assert_eq!(held.signal_type, SignalType::Hold);
        assert_eq!(held.confidence, 70.0);
        assert!(held.price_targets.is_none());
    }

    #[test]
    fn test_opposites() {
        assert!(SignalType::Buy.is_opposite_of(SignalType::Sell));
        assert!(!SignalType::Buy.is_opposite_of(SignalType::Hold));
        assert_eq!(SignalType::Neutral.opposite(), None);
    }
}
