//! Support and resistance detection
//!
//! Swing highs/lows inside a lookback window are clustered by price
//! proximity; clusters are ranked by touch count, then recency.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Number of trailing candles searched for extrema
    pub lookback: usize,
    /// Bars on each side a swing point must dominate
    pub pivot_strength: usize,
    /// Relative band within which extrema merge (0.005 = 0.5%)
    pub cluster_tolerance: f64,
    /// Levels returned per side
    pub max_levels: usize,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            lookback: 100,
            pivot_strength: 2,
            cluster_tolerance: 0.005,
            max_levels: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    /// Levels at or below the latest close, strongest first
    pub support: Vec<f64>,
    /// Levels above the latest close, strongest first
    pub resistance: Vec<f64>,
}

impl SupportResistance {
    /// Closest support strictly below `price`
    pub fn nearest_support(&self, price: f64) -> Option<f64> {
        self.support
            .iter()
            .copied()
            .filter(|level| *level < price)
            .max_by(f64::total_cmp)
    }

    /// Closest resistance strictly above `price`
    pub fn nearest_resistance(&self, price: f64) -> Option<f64> {
        self.resistance
            .iter()
            .copied()
            .filter(|level| *level > price)
            .min_by(f64::total_cmp)
    }
}

#[derive(Debug, Clone, Copy)]
struct Touch {
    price: f64,
    index: usize,
}

#[derive(Debug, Clone)]
struct Cluster {
    sum: f64,
    touches: usize,
    last_index: usize,
}

impl Cluster {
    fn mean(&self) -> f64 {
        self.sum / self.touches as f64
    }
}

/// Indices of swing highs (`is_high`) or swing lows in `values`
fn pivots(values: &[f64], strength: usize, is_high: bool) -> Vec<usize> {
    if values.len() < 2 * strength + 1 {
        return Vec::new();
    }
    (strength..values.len() - strength)
        .filter(|&i| {
            let v = values[i];
            (i - strength..=i + strength)
                .filter(|&j| j != i)
                .all(|j| if is_high { v >= values[j] } else { v <= values[j] })
        })
        .collect()
}

/// Detect ranked support/resistance levels. Every returned level lies in
/// `[min(low), max(high)]` of the lookback window.
pub fn support_resistance(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    config: &LevelConfig,
) -> SupportResistance {
    let n = highs.len().min(lows.len()).min(closes.len());
    if n == 0 || config.lookback == 0 {
        return SupportResistance::default();
    }
    let start = n.saturating_sub(config.lookback);
    let window_highs = &highs[start..n];
    let window_lows = &lows[start..n];
    let window_len = window_highs.len();

    let floor = window_lows.iter().copied().fold(f64::INFINITY, f64::min);
    let ceiling = window_highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut touches: Vec<Touch> = pivots(window_highs, config.pivot_strength, true)
        .into_iter()
        .map(|index| Touch { price: window_highs[index], index })
        .chain(
            pivots(window_lows, config.pivot_strength, false)
                .into_iter()
                .map(|index| Touch { price: window_lows[index], index }),
        )
        .collect();
    touches.sort_by(|a, b| a.price.total_cmp(&b.price));

    let mut clusters: Vec<Cluster> = Vec::new();
    for touch in touches {
        match clusters.last_mut() {
            Some(cluster)
                if (touch.price - cluster.mean()).abs()
                    <= cluster.mean().abs() * config.cluster_tolerance =>
            {
                cluster.sum += touch.price;
                cluster.touches += 1;
                cluster.last_index = cluster.last_index.max(touch.index);
            }
            _ => clusters.push(Cluster {
                sum: touch.price,
                touches: 1,
                last_index: touch.index,
            }),
        }
    }

    let score = |c: &Cluster| c.touches as f64 + (c.last_index + 1) as f64 / window_len as f64;
    clusters.sort_by(|a, b| score(b).total_cmp(&score(a)));

    let price = closes[n - 1];
    let mut levels = SupportResistance::default();
    for cluster in &clusters {
        let level = cluster.mean().clamp(floor, ceiling);
        if level <= price {
            if levels.support.len() < config.max_levels {
                levels.support.push(level);
            }
        } else if levels.resistance.len() < config.max_levels {
            levels.resistance.push(level);
        }
    }
    levels
}
