//! Position tracking and closed-trade records.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Direction of an open position or closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Long => "long",
            TradeSide::Short => "short",
        }
    }

    /// pnl per unit: exit - entry for long, entry - exit for short.
    pub fn pnl(&self, entry_price: f64, exit_price: f64) -> f64 {
        match self {
            TradeSide::Long => exit_price - entry_price,
            TradeSide::Short => entry_price - exit_price,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(TradeSide::Long),
            "short" => Ok(TradeSide::Short),
            other => Err(format!("unknown trade side '{}' (expected long or short)", other)),
        }
    }
}

/// Observable state of the position state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "flat"),
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub side: TradeSide,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == TradeSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == TradeSide::Short
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.pnl(self.entry_price, price)
    }

    pub fn close(self, exit_time: DateTime<Utc>, exit_price: f64) -> TradeRecord {
        TradeRecord {
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            side: self.side,
            pnl: self.side.pnl(self.entry_price, exit_price),
        }
    }

    pub fn mark(&self, time: DateTime<Utc>, last_price: f64) -> MarkToMarket {
        MarkToMarket {
            time,
            side: self.side,
            entry_price: self.entry_price,
            entry_time: self.entry_time,
            last_price,
            unrealized_pnl: self.unrealized_pnl(last_price),
        }
    }
}

/// A realized, closed position. Never modified once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub side: TradeSide,
    pub pnl: f64,
}

/// Unrealized valuation of the open position at the latest seen price.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkToMarket {
    pub time: DateTime<Utc>,
    pub side: TradeSide,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub last_price: f64,
    pub unrealized_pnl: f64,
}
