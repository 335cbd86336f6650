//! Structural checks on synthesized signals

use crate::strategy::{Signal, SignalType};
use anyhow::bail;

/// Signal validator
pub struct SignalValidator;

impl SignalValidator {
    /// Validate a signal before it leaves the synthesizer
    pub fn validate(signal: &Signal) -> crate::Result<()> {
        if !signal.confidence.is_finite() || !(0.0..=100.0).contains(&signal.confidence) {
            bail!("Confidence {} outside [0, 100]", signal.confidence);
        }

        for vote in &signal.contributing {
            if !(0.0..=100.0).contains(&vote.strength) {
                bail!("Vote '{}' strength {} outside [0, 100]", vote.source, vote.strength);
            }
        }

        match (signal.signal_type, signal.price_targets) {
            (SignalType::Buy, Some(t)) => {
                if !(t.stop_loss < t.entry && t.entry < t.target1 && t.target1 < t.target2 && t.target2 < t.target3) {
                    bail!("BUY targets out of order: {:?}", t);
                }
            }
            (SignalType::Sell, Some(t)) => {
                if !(t.stop_loss > t.entry && t.entry > t.target1 && t.target1 > t.target2 && t.target2 > t.target3) {
                    bail!("SELL targets out of order: {:?}", t);
                }
            }
            (SignalType::Buy | SignalType::Sell, None) => {
                bail!("{} signal without price targets", signal.signal_type);
            }
            (other, Some(_)) => {
                bail!("{} signal must not carry price targets", other);
            }
            (_, None) => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::PriceTargets;
    use chrono::Utc;

    fn targets(entry: f64, stop: f64) -> PriceTargets {
        let risk = entry - stop;
        PriceTargets {
            entry,
            stop_loss: stop,
            target1: entry + risk,
            target2: entry + 2.0 * risk,
            target3: entry + 3.0 * risk,
            risk_reward_ratio: 1.0,
        }
    }

    #[test]
    fn test_valid_buy() {
        let s = Signal::buy(70.0, Utc::now()).with_targets(Some(targets(100.0, 95.0)));
        assert!(SignalValidator::validate(&s).is_ok());
    }

    #[test]
    fn test_buy_without_targets_rejected() {
        assert!(SignalValidator::validate(&Signal::buy(70.0, Utc::now())).is_err());
    }

    #[test]
    fn test_sell_with_buy_geometry_rejected() {
        let s = Signal::sell(70.0, Utc::now()).with_targets(Some(targets(100.0, 95.0)));
        assert!(SignalValidator::validate(&s).is_err());
    }

    #[test]
    fn test_neutral_ok() {
        assert!(SignalValidator::validate(&Signal::neutral(12.0, Utc::now())).is_ok());
    }
}
