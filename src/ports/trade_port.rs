//! Trade input port trait.

use crate::domain::error::FlowtraderError;
use crate::domain::trade::Trade;

pub trait TradePort {
    /// Load every trade, ordered by time with ties kept in source order.
    fn load_trades(&self) -> Result<Vec<Trade>, FlowtraderError>;
}
