//! Signal synthesis: turns the latest indicator snapshot into one aggregate
//! signal with confidence, an ordered explanation and price targets.

use crate::data::{Candle, CandleSeries};
use crate::indicators::{IndicatorSnapshot, LatestIndicators, SupportResistance};
use crate::strategy::{
    CandlestickPatterns, PatternConfig, PatternDetector, PriceTargets, Signal, SignalType,
    SignalVote, VoteDirection, VoteKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SOURCE_RSI: &str = "RSI";
pub const SOURCE_MACD: &str = "MACD";
pub const SOURCE_BOLLINGER: &str = "Bollinger";
pub const SOURCE_TREND: &str = "Trend";
pub const SOURCE_LEVELS: &str = "Support/Resistance";
pub const SOURCE_VOLUME: &str = "Volume";
pub const SOURCE_CONFLUENCE: &str = "MACD/RSI Confluence";

/// Relative weight of each vote source in the aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteWeights {
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub trend: f64,
    pub levels: f64,
    pub volume: f64,
    pub pattern: f64,
    pub composite: f64,
}

impl Default for VoteWeights {
    fn default() -> Self {
        Self {
            rsi: 1.0,
            macd: 1.2,
            bollinger: 0.8,
            trend: 1.0,
            levels: 0.8,
            volume: 0.6,
            pattern: 0.7,
            composite: 1.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Aggregate confidence at or below this yields NEUTRAL
    pub neutral_floor: f64,
    /// Share of the losing side's weighted strength subtracted from the winner
    pub opposition_penalty: f64,
    pub weights: VoteWeights,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_soft_low: f64,
    pub rsi_soft_high: f64,
    /// Relative distance to a level that counts as "at" the level
    pub level_proximity: f64,
    pub volume_lookback: usize,
    pub volume_spike_ratio: f64,
    /// Candles searched for a swing extreme when no level is available
    pub swing_lookback: usize,
    /// Stop buffer in ATRs beyond the swing extreme
    pub stop_atr_multiplier: f64,
    /// Smallest stop distance as a fraction of entry
    pub min_stop_distance: f64,
    pub patterns: PatternConfig,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            neutral_floor: 30.0,
            opposition_penalty: 0.5,
            weights: VoteWeights::default(),
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_soft_low: 40.0,
            rsi_soft_high: 60.0,
            level_proximity: 0.01,
            volume_lookback: 20,
            volume_spike_ratio: 1.5,
            swing_lookback: 20,
            stop_atr_multiplier: 0.5,
            min_stop_distance: 0.005,
            patterns: PatternConfig::default(),
        }
    }
}

pub struct SignalSynthesizer {
    config: SynthesizerConfig,
    detectors: Vec<Box<dyn PatternDetector>>,
}

impl SignalSynthesizer {
    /// Synthesizer with the built-in candlestick detector
    pub fn new(config: SynthesizerConfig) -> Self {
        let candlestick = CandlestickPatterns::new(config.patterns.clone());
        Self {
            config,
            detectors: vec![Box::new(candlestick)],
        }
    }

    /// Synthesizer without any pattern detector
    pub fn indicators_only(config: SynthesizerConfig) -> Self {
        Self {
            config,
            detectors: Vec::new(),
        }
    }

    pub fn with_detector(mut self, detector: Box<dyn PatternDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    pub fn synthesize(&self, series: &CandleSeries, snapshot: &IndicatorSnapshot) -> Signal {
        let Some(last) = series.last() else {
            return Signal::neutral(0.0, DateTime::<Utc>::default());
        };
        let latest = snapshot.latest();

        let mut votes: Vec<SignalVote> = Vec::new();
        let rsi_vote = self.rsi_vote(&latest);
        let macd_vote = self.macd_vote(&latest);
        if let Some(composite) = self.confluence_vote(rsi_vote.as_ref(), macd_vote.as_ref()) {
            votes.push(composite);
        }
        votes.extend(rsi_vote);
        votes.extend(macd_vote);
        votes.extend(self.bollinger_vote(last.close, &latest));
        votes.extend(self.trend_vote(last.close, &latest));
        votes.extend(self.level_vote(last.close, &snapshot.support_resistance));
        votes.extend(self.volume_vote(series.candles()));
        for detector in &self.detectors {
            votes.extend(detector.detect(series.candles()));
        }

        let (signal_type, confidence) = self.aggregate(&votes);
        debug!(
            signal = %signal_type,
            confidence = format!("{:.1}", confidence),
            votes = votes.len(),
            "Synthesized signal"
        );

        let targets = match signal_type {
            SignalType::Buy | SignalType::Sell => {
                Some(self.price_targets(signal_type, series, last, &latest, &snapshot.support_resistance))
            }
            _ => None,
        };

        Signal::new(signal_type, confidence, last.open_time)
            .with_votes(votes)
            .with_targets(targets)
    }

    fn weight(&self, vote: &SignalVote) -> f64 {
        let w = &self.config.weights;
        match vote.kind {
            VoteKind::Composite => w.composite,
            VoteKind::Pattern => w.pattern,
            VoteKind::Indicator => match vote.source.as_str() {
                SOURCE_RSI => w.rsi,
                SOURCE_MACD => w.macd,
                SOURCE_BOLLINGER => w.bollinger,
                SOURCE_TREND => w.trend,
                SOURCE_LEVELS => w.levels,
                SOURCE_VOLUME => w.volume,
                _ => 1.0,
            },
        }
    }

    /// Weighted majority direction and its normalized confidence
    fn aggregate(&self, votes: &[SignalVote]) -> (SignalType, f64) {
        let (mut bull, mut bear) = (0.0, 0.0);
        let (mut bull_weight, mut bear_weight) = (0.0, 0.0);
        for vote in votes {
            let w = self.weight(vote);
            match vote.direction {
                VoteDirection::Bullish => {
                    bull += w * vote.strength;
                    bull_weight += w;
                }
                VoteDirection::Bearish => {
                    bear += w * vote.strength;
                    bear_weight += w;
                }
                VoteDirection::Neutral => {}
            }
        }
        if bull == bear {
            return (SignalType::Neutral, 0.0);
        }

        // Winner's weighted mean strength, less a share of the opposition
        let (direction, win, lose, win_weight) = if bull > bear {
            (SignalType::Buy, bull, bear, bull_weight)
        } else {
            (SignalType::Sell, bear, bull, bear_weight)
        };
        if win_weight <= 0.0 {
            return (SignalType::Neutral, 0.0);
        }
        let confidence =
            ((win - lose * self.config.opposition_penalty) / win_weight).clamp(0.0, 100.0);
        if confidence <= self.config.neutral_floor {
            (SignalType::Neutral, confidence)
        } else {
            (direction, confidence)
        }
    }

    fn rsi_vote(&self, latest: &LatestIndicators) -> Option<SignalVote> {
        let rsi = latest.rsi?;
        let c = &self.config;
        let vote = if rsi < c.rsi_oversold {
            let depth = (c.rsi_oversold - rsi) / c.rsi_oversold.max(f64::EPSILON);
            SignalVote::indicator(SOURCE_RSI, VoteDirection::Bullish, 60.0 + depth * 40.0, format!("RSI oversold at {:.1}", rsi))
        } else if rsi > c.rsi_overbought {
            let depth = (rsi - c.rsi_overbought) / (100.0 - c.rsi_overbought).max(f64::EPSILON);
            SignalVote::indicator(SOURCE_RSI, VoteDirection::Bearish, 60.0 + depth * 40.0, format!("RSI overbought at {:.1}", rsi))
        } else if rsi < c.rsi_soft_low {
            SignalVote::indicator(SOURCE_RSI, VoteDirection::Bullish, 25.0, format!("RSI leaning low at {:.1}", rsi))
        } else if rsi > c.rsi_soft_high {
            SignalVote::indicator(SOURCE_RSI, VoteDirection::Bearish, 25.0, format!("RSI leaning high at {:.1}", rsi))
        } else {
            SignalVote::indicator(SOURCE_RSI, VoteDirection::Neutral, 0.0, format!("RSI neutral at {:.1}", rsi))
        };
        Some(vote)
    }

    fn macd_vote(&self, latest: &LatestIndicators) -> Option<SignalVote> {
        let hist = latest.macd_histogram?;
        let vote = match latest.prev_macd_histogram {
            Some(prev) if prev <= 0.0 && hist > 0.0 => {
                SignalVote::indicator(SOURCE_MACD, VoteDirection::Bullish, 75.0, "MACD crossed above signal")
            }
            Some(prev) if prev >= 0.0 && hist < 0.0 => {
                SignalVote::indicator(SOURCE_MACD, VoteDirection::Bearish, 75.0, "MACD crossed below signal")
            }
            prev => {
                let expanding = prev.map_or(false, |p| hist.abs() > p.abs());
                let strength = if expanding { 45.0 } else { 30.0 };
                if hist > 0.0 {
                    SignalVote::indicator(SOURCE_MACD, VoteDirection::Bullish, strength, format!("MACD histogram positive ({:.4})", hist))
                } else if hist < 0.0 {
                    SignalVote::indicator(SOURCE_MACD, VoteDirection::Bearish, strength, format!("MACD histogram negative ({:.4})", hist))
                } else {
                    SignalVote::indicator(SOURCE_MACD, VoteDirection::Neutral, 0.0, "MACD flat")
                }
            }
        };
        Some(vote)
    }

    fn confluence_vote(&self, rsi: Option<&SignalVote>, macd: Option<&SignalVote>) -> Option<SignalVote> {
        let (rsi, macd) = (rsi?, macd?);
        if rsi.direction != macd.direction || rsi.direction == VoteDirection::Neutral {
            return None;
        }
        let side = if rsi.direction == VoteDirection::Bullish { "bullish" } else { "bearish" };
        Some(SignalVote::new(
            SOURCE_CONFLUENCE,
            VoteKind::Composite,
            rsi.direction,
            (rsi.strength + macd.strength) / 2.0 + 10.0,
            format!("RSI and MACD agree {}", side),
        ))
    }

    fn bollinger_vote(&self, close: f64, latest: &LatestIndicators) -> Option<SignalVote> {
        let (upper, lower) = (latest.bb_upper?, latest.bb_lower?);
        let width = upper - lower;
        if width <= 0.0 {
            return None;
        }
        let position = (close - lower) / width;
        let vote = if close <= lower {
            SignalVote::indicator(SOURCE_BOLLINGER, VoteDirection::Bullish, 55.0 + (-position * 100.0).min(30.0), "Close at or below lower band")
        } else if close >= upper {
            SignalVote::indicator(SOURCE_BOLLINGER, VoteDirection::Bearish, 55.0 + ((position - 1.0) * 100.0).min(30.0), "Close at or above upper band")
        } else if position < 0.2 {
            SignalVote::indicator(SOURCE_BOLLINGER, VoteDirection::Bullish, 30.0, "Close near lower band")
        } else if position > 0.8 {
            SignalVote::indicator(SOURCE_BOLLINGER, VoteDirection::Bearish, 30.0, "Close near upper band")
        } else {
            SignalVote::indicator(SOURCE_BOLLINGER, VoteDirection::Neutral, 0.0, "Close inside bands")
        };
        Some(vote)
    }

    fn trend_vote(&self, close: f64, latest: &LatestIndicators) -> Option<SignalVote> {
        let sma = latest.sma?;
        let vote = match latest.ema {
            Some(ema) if close > sma && sma > ema => {
                SignalVote::indicator(SOURCE_TREND, VoteDirection::Bullish, 50.0, "Price above SMA above EMA")
            }
            Some(ema) if close < sma && sma < ema => {
                SignalVote::indicator(SOURCE_TREND, VoteDirection::Bearish, 50.0, "Price below SMA below EMA")
            }
            Some(ema) if close > ema => {
                SignalVote::indicator(SOURCE_TREND, VoteDirection::Bullish, 30.0, "Price above EMA")
            }
            Some(ema) if close < ema => {
                SignalVote::indicator(SOURCE_TREND, VoteDirection::Bearish, 30.0, "Price below EMA")
            }
            Some(_) => SignalVote::indicator(SOURCE_TREND, VoteDirection::Neutral, 0.0, "Price at EMA"),
            None if close > sma => {
                SignalVote::indicator(SOURCE_TREND, VoteDirection::Bullish, 25.0, "Price above SMA")
            }
            None if close < sma => {
                SignalVote::indicator(SOURCE_TREND, VoteDirection::Bearish, 25.0, "Price below SMA")
            }
            None => SignalVote::indicator(SOURCE_TREND, VoteDirection::Neutral, 0.0, "Price at SMA"),
        };
        Some(vote)
    }

    fn level_vote(&self, close: f64, levels: &SupportResistance) -> Option<SignalVote> {
        let proximity = self.config.level_proximity;
        let support = levels
            .nearest_support(close)
            .map(|s| (s, (close - s) / close))
            .filter(|(_, d)| *d <= proximity);
        let resistance = levels
            .nearest_resistance(close)
            .map(|r| (r, (r - close) / close))
            .filter(|(_, d)| *d <= proximity);

        let closeness = |d: f64| 20.0 + (1.0 - d / proximity.max(f64::EPSILON)) * 30.0;
        match (support, resistance) {
            (Some((s, ds)), Some((_, dr))) if ds <= dr => Some(SignalVote::indicator(
                SOURCE_LEVELS, VoteDirection::Bullish, closeness(ds), format!("Holding support at {:.4}", s),
            )),
            (_, Some((r, dr))) => Some(SignalVote::indicator(
                SOURCE_LEVELS, VoteDirection::Bearish, closeness(dr), format!("Testing resistance at {:.4}", r),
            )),
            (Some((s, ds)), None) => Some(SignalVote::indicator(
                SOURCE_LEVELS, VoteDirection::Bullish, closeness(ds), format!("Holding support at {:.4}", s),
            )),
            (None, None) => None,
        }
    }

    fn volume_vote(&self, candles: &[Candle]) -> Option<SignalVote> {
        let lookback = self.config.volume_lookback;
        if lookback == 0 || candles.len() < lookback + 1 {
            return None;
        }
        let (history, last) = candles.split_at(candles.len() - 1);
        let last = &last[0];
        let window = &history[history.len() - lookback..];
        let average = window.iter().map(|c| c.volume).sum::<f64>() / lookback as f64;
        if average <= 0.0 {
            return None;
        }
        let ratio = last.volume / average;
        if ratio < self.config.volume_spike_ratio || last.body_size() == 0.0 {
            return None;
        }
        let strength = (30.0 + (ratio - self.config.volume_spike_ratio) * 20.0).min(70.0);
        let (direction, side) = if last.is_bullish() {
            (VoteDirection::Bullish, "buying")
        } else {
            (VoteDirection::Bearish, "selling")
        };
        Some(SignalVote::indicator(
            SOURCE_VOLUME,
            direction,
            strength,
            format!("Volume spike {:.1}x average on {}", ratio, side),
        ))
    }

    fn price_targets(
        &self,
        signal_type: SignalType,
        series: &CandleSeries,
        last: &Candle,
        latest: &LatestIndicators,
        levels: &SupportResistance,
    ) -> PriceTargets {
        let c = &self.config;
        let entry = last.close;
        let min_distance = entry * c.min_stop_distance;
        let buffer = latest
            .atr
            .map(|atr| atr * c.stop_atr_multiplier)
            .unwrap_or(min_distance);
        let recent = series.tail(c.swing_lookback);

        let stop_loss = if signal_type == SignalType::Buy {
            let swing_low = levels.nearest_support(entry).unwrap_or_else(|| {
                recent.iter().map(|k| k.low).fold(entry, f64::min)
            });
            let stop = (swing_low - buffer).min(entry - min_distance);
            if stop > 0.0 { stop } else { entry - min_distance }
        } else {
            let swing_high = levels.nearest_resistance(entry).unwrap_or_else(|| {
                recent.iter().map(|k| k.high).fold(entry, f64::max)
            });
            (swing_high + buffer).max(entry + min_distance)
        };

        let risk = (entry - stop_loss).abs();
        let sign = if signal_type == SignalType::Buy { 1.0 } else { -1.0 };
        let target1 = entry + sign * risk;
        let risk_reward_ratio = if risk > 0.0 { (target1 - entry).abs() / risk } else { 0.0 };
        PriceTargets {
            entry,
            stop_loss,
            target1,
            target2: entry + sign * 2.0 * risk,
            target3: entry + sign * 3.0 * risk,
            risk_reward_ratio,
        }
    }
}

impl Default for SignalSynthesizer {
    fn default() -> Self {
        Self::new(SynthesizerConfig::default())
    }
}
