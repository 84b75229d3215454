//! Relative Strength Index over a simple rolling mean of gains and losses.
//!
//! The rolling mean uses a minimum of one observation, so positions before the
//! first full window average over whatever price changes are available. The first
//! price has no change and therefore no RSI.

pub const DEFAULT_RSI_WINDOW: usize = 14;

/// RSI for every position of `prices`, index-aligned with the input.
///
/// `None` marks positions without a signal: the first price, windows with neither
/// gains nor losses, and windows touching a non-finite price.
pub fn calculate_rsi(prices: &[f64], window: usize) -> Vec<Option<f64>> {
    if prices.is_empty() {
        return Vec::new();
    }
    if window == 0 {
        return vec![None; prices.len()];
    }

    let moves: Vec<Option<(f64, f64)>> = prices
        .windows(2)
        .map(|w| {
            let delta = w[1] - w[0];
            delta
                .is_finite()
                .then(|| (delta.max(0.0), (-delta).max(0.0)))
        })
        .collect();

    let mut out = Vec::with_capacity(prices.len());
    out.push(None);

    for i in 0..moves.len() {
        let lo = (i + 1).saturating_sub(window);
        out.push(rsi_over(&moves[lo..=i]));
    }

    out
}

/// RSI at the last position of `prices`, if defined.
pub fn latest_rsi(prices: &[f64], window: usize) -> Option<f64> {
    calculate_rsi(prices, window).last().copied().flatten()
}

fn rsi_over(moves: &[Option<(f64, f64)>]) -> Option<f64> {
    let mut gain = 0.0;
    let mut loss = 0.0;
    for m in moves {
        let (g, l) = (*m)?;
        gain += g;
        loss += l;
    }

    let n = moves.len() as f64;
    rsi_from_averages(gain / n, loss / n)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        // Only gains saturate at 100; no movement at all has no signal.
        return (avg_gain > 0.0).then_some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}
