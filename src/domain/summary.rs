//! Run statistics over realized trades and enriched features.

use super::position::TradeRecord;
use super::trade::{EnrichedTrade, Side};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSummary {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl LedgerSummary {
    pub fn compute(records: &[TradeRecord]) -> Self {
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_pnl = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for record in records {
            let pnl = record.pnl;
            total_pnl += pnl;
            if pnl > 0.0 {
                trades_won += 1;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = records.len();
        let (win_rate, avg_pnl) = if total_trades > 0 {
            (
                trades_won as f64 / total_trades as f64,
                total_pnl / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        LedgerSummary {
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            total_pnl,
            avg_pnl,
            largest_win,
            largest_loss,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub final_cvd: f64,
    /// `None` when no row had a defined imbalance.
    pub imbalance_range: Option<(f64, f64)>,
    pub undefined_rows: usize,
}

impl FeatureSummary {
    pub fn compute(rows: &[EnrichedTrade]) -> Self {
        let buy_trades = rows.iter().filter(|r| r.trade.side == Side::Buy).count();
        let imbalance_range = rows
            .iter()
            .filter_map(|r| r.order_imbalance)
            .fold(None, |acc: Option<(f64, f64)>, oi| match acc {
                None => Some((oi, oi)),
                Some((lo, hi)) => Some((lo.min(oi), hi.max(oi))),
            });

        FeatureSummary {
            buy_trades,
            sell_trades: rows.len() - buy_trades,
            final_cvd: rows.last().map(|r| r.cvd).unwrap_or(0.0),
            imbalance_range,
            undefined_rows: rows.iter().filter(|r| r.order_imbalance.is_none()).count(),
        }
    }
}
