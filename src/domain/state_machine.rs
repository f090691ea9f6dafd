//! Signal-driven position state machine.
//!
//! | state | signal | action                                   |
//! |-------|--------|------------------------------------------|
//! | Flat  | Long   | open long                                |
//! | Flat  | Short  | open short                               |
//! | Long  | Short  | close long, open short at the same price |
//! | Short | Long   | close short, open long at the same price |
//! | any   | Flat   | nothing; an open position stays open     |
//! | Long  | Long   | nothing                                  |
//! | Short | Short  | nothing                                  |

use tracing::debug;

use super::position::{MarkToMarket, Position, PositionSide, TradeRecord, TradeSide};
use super::signal::Signal;
use super::trade::EnrichedTrade;

/// What happened on one processed row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transition {
    /// Realized trade, present when this row closed a position.
    pub closed: Option<TradeRecord>,
    /// Side opened on this row, if any.
    pub opened: Option<TradeSide>,
    /// Valuation of whatever position is open after this row.
    pub mark: Option<MarkToMarket>,
}

#[derive(Debug, Clone, Default)]
pub struct PositionStateMachine {
    position: Option<Position>,
}

impl PositionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn side(&self) -> PositionSide {
        match &self.position {
            None => PositionSide::Flat,
            Some(p) if p.is_long() => PositionSide::Long,
            Some(_) => PositionSide::Short,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn step(&mut self, row: &EnrichedTrade, signal: Signal) -> Transition {
        let target = match signal {
            Signal::Long => Some(TradeSide::Long),
            Signal::Short => Some(TradeSide::Short),
            Signal::Flat => None,
        };

        let mut transition = Transition::default();

        if let Some(target) = target {
            let current = self.position.as_ref().map(|p| p.side);
            if current != Some(target) {
                if let Some(open) = self.position.take() {
                    let record = open.close(row.time(), row.price());
                    debug!(
                        side = %record.side,
                        entry_price = record.entry_price,
                        exit_price = record.exit_price,
                        pnl = record.pnl,
                        "closed position"
                    );
                    transition.closed = Some(record);
                }
                debug!(side = %target, price = row.price(), "opened position");
                self.position = Some(Position {
                    side: target,
                    entry_price: row.price(),
                    entry_time: row.time(),
                });
                transition.opened = Some(target);
            }
        }

        transition.mark = self
            .position
            .as_ref()
            .map(|p| p.mark(row.time(), row.price()));
        transition
    }
}
