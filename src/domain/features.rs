//! Order-flow feature computation: cumulative volume delta and rolling
//! order imbalance.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use super::trade::{EnrichedTrade, Trade};

pub const DEFAULT_WINDOW: usize = 50;

/// Incremental feature engine.
///
/// volume_delta[i] = buy_volume[i] - sell_volume[i]
/// cvd[i] = cvd[i-1] + volume_delta[i], cvd[0] = volume_delta[0]
/// rolling sums cover the last `window` trades, or every trade seen so far
/// while fewer than `window` have arrived.
/// order_imbalance = (buy_sum - sell_sum) / (buy_sum + sell_sum), undefined
/// when the denominator is zero.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    window: NonZeroUsize,
    cvd: f64,
    recent: VecDeque<(f64, f64)>,
}

impl FeatureEngine {
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window,
            cvd: 0.0,
            recent: VecDeque::new(),
        }
    }

    pub fn cvd(&self) -> f64 {
        self.cvd
    }

    /// Advance by one trade. Trades must be pushed in time order.
    pub fn push(&mut self, trade: &Trade) -> EnrichedTrade {
        let buy_volume = trade.buy_volume();
        let sell_volume = trade.sell_volume();
        let volume_delta = buy_volume - sell_volume;
        self.cvd += volume_delta;

        if self.recent.len() == self.window.get() {
            self.recent.pop_front();
        }
        self.recent.push_back((buy_volume, sell_volume));

        // Resummed on every push, O(window) per trade, so each sum is exactly
        // the trailing sum with no drift from a sliding add/subtract.
        let rolling_buy_sum: f64 = self.recent.iter().map(|(b, _)| b).sum();
        let rolling_sell_sum: f64 = self.recent.iter().map(|(_, s)| s).sum();

        EnrichedTrade {
            trade: trade.clone(),
            buy_volume,
            sell_volume,
            volume_delta,
            cvd: self.cvd,
            rolling_buy_sum,
            rolling_sell_sum,
            order_imbalance: order_imbalance(rolling_buy_sum, rolling_sell_sum),
        }
    }
}

/// Normalized buy/sell difference, `None` when there is no volume.
pub fn order_imbalance(buy_sum: f64, sell_sum: f64) -> Option<f64> {
    let total = buy_sum + sell_sum;
    if total > 0.0 {
        Some((buy_sum - sell_sum) / total)
    } else {
        None
    }
}

/// Enrich a whole trade sequence. Output has the same length and order.
pub fn compute(trades: &[Trade], window: NonZeroUsize) -> Vec<EnrichedTrade> {
    let mut engine = FeatureEngine::new(window);
    trades.iter().map(|t| engine.push(t)).collect()
}
