//! Executed trade events and their order-flow enrichment.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// Aggressor side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(Side::Buy),
            "sell" | "s" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}' (expected buy or sell)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub side: Side,
}

impl Trade {
    pub fn buy_volume(&self) -> f64 {
        match self.side {
            Side::Buy => self.volume,
            Side::Sell => 0.0,
        }
    }

    pub fn sell_volume(&self) -> f64 {
        match self.side {
            Side::Buy => 0.0,
            Side::Sell => self.volume,
        }
    }
}

/// A trade plus the order-flow features derived up to and including it.
///
/// `order_imbalance` is `None` when the rolling window holds no volume at all.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTrade {
    pub trade: Trade,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub volume_delta: f64,
    pub cvd: f64,
    pub rolling_buy_sum: f64,
    pub rolling_sell_sum: f64,
    pub order_imbalance: Option<f64>,
}

impl EnrichedTrade {
    pub fn time(&self) -> DateTime<Utc> {
        self.trade.time
    }

    pub fn price(&self) -> f64 {
        self.trade.price
    }
}

/// Parse a trade timestamp.
///
/// Accepts Unix epoch seconds with an optional fractional part (parsed
/// digit-exact down to nanoseconds), RFC 3339, or a naive
/// `YYYY-MM-DD HH:MM:SS[.f]` datetime taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(ts) = parse_epoch_seconds(value) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn parse_epoch_seconds(value: &str) -> Option<DateTime<Utc>> {
    let (whole, frac) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let secs: i64 = whole.parse().ok()?;
    let digits = &frac[..frac.len().min(9)];
    let nanos: u32 = format!("{:0<9}", digits).parse().ok()?;
    DateTime::from_timestamp(secs, nanos)
}

/// RFC 3339 in UTC with only as many fractional digits as needed.
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
