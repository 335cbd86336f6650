//! ATR (Average True Range), Wilder smoothing

/// True range of each bar; the first bar falls back to `high - low`
pub fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = highs.len().min(lows.len()).min(closes.len());
    (0..n)
        .map(|i| {
            let range = highs[i] - lows[i];
            if i == 0 {
                range
            } else {
                let prev_close = closes[i - 1];
                range
                    .max((highs[i] - prev_close).abs())
                    .max((lows[i] - prev_close).abs())
            }
        })
        .collect()
}

/// Calculate ATR; defined from index `period - 1`
pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let tr = true_ranges(highs, lows, closes);
    let mut out = vec![None; tr.len()];
    if period == 0 || tr.len() < period {
        return out;
    }

    let p = period as f64;
    let mut atr = tr[..period].iter().sum::<f64>() / p;
    out[period - 1] = Some(atr);
    for i in period..tr.len() {
        atr = (atr * (p - 1.0) + tr[i]) / p;
        out[i] = Some(atr);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_range() {
        let highs = vec![11.0; 20];
        let lows = vec![9.0; 20];
        let closes = vec![10.0; 20];
        let out = calculate_atr(&highs, &lows, &closes, 14);
        assert!(out[12].is_none());
        assert_eq!(out[13], Some(2.0));
        assert_eq!(out[19], Some(2.0));
    }

    #[test]
    fn test_gap_counts_in_true_range() {
        let tr = true_ranges(&[10.0, 15.0], &[9.0, 14.0], &[9.5, 14.5]);
        assert_eq!(tr, vec![1.0, 5.5]);
    }
}
