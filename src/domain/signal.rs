//! Directional signals and the strategies that produce them.

use std::fmt;
use std::str::FromStr;

use super::trade::EnrichedTrade;

pub const DEFAULT_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Long,
    Short,
    Flat,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "LONG"),
            Signal::Short => write!(f, "SHORT"),
            Signal::Flat => write!(f, "FLAT"),
        }
    }
}

/// Maps an enriched trade to a signal.
///
/// Generators are evaluated once per row, strictly in trade order. Stateful
/// generators carry their state in `self`, so the caller owns it for the
/// lifetime of one backtest run.
pub trait SignalGenerator {
    fn evaluate(&mut self, trade: &EnrichedTrade) -> Signal;

    fn name(&self) -> &'static str;
}

/// Long above `threshold`, short below `-threshold`, flat otherwise or when
/// the imbalance is undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImbalanceThreshold {
    pub threshold: f64,
}

impl ImbalanceThreshold {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn signal_for(&self, order_imbalance: Option<f64>) -> Signal {
        match order_imbalance {
            Some(oi) if oi > self.threshold => Signal::Long,
            Some(oi) if oi < -self.threshold => Signal::Short,
            _ => Signal::Flat,
        }
    }
}

impl SignalGenerator for ImbalanceThreshold {
    fn evaluate(&mut self, trade: &EnrichedTrade) -> Signal {
        self.signal_for(trade.order_imbalance)
    }

    fn name(&self) -> &'static str {
        "imbalance_threshold"
    }
}

/// Fires when CVD turns back toward zero from the other side.
///
/// Long when cvd rises while the previous cvd was negative, short when it
/// falls while the previous cvd was positive. The previous value starts at 0
/// and is replaced by the current cvd after every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CvdReversal {
    prev_cvd: f64,
}

impl CvdReversal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a previously observed cvd.
    pub fn with_previous(prev_cvd: f64) -> Self {
        Self { prev_cvd }
    }

    pub fn previous(&self) -> f64 {
        self.prev_cvd
    }
}

impl SignalGenerator for CvdReversal {
    fn evaluate(&mut self, trade: &EnrichedTrade) -> Signal {
        let prev = self.prev_cvd;
        let cvd = trade.cvd;
        self.prev_cvd = cvd;
        if cvd > prev && prev < 0.0 {
            Signal::Long
        } else if cvd < prev && prev > 0.0 {
            Signal::Short
        } else {
            Signal::Flat
        }
    }

    fn name(&self) -> &'static str {
        "cvd_reversal"
    }
}

/// Strategy selection as read from config or command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StrategyKind {
    ImbalanceThreshold { threshold: f64 },
    CvdReversal,
}

impl StrategyKind {
    /// Build a fresh generator; state starts from scratch for each call.
    pub fn build(&self) -> Box<dyn SignalGenerator> {
        match *self {
            StrategyKind::ImbalanceThreshold { threshold } => {
                Box::new(ImbalanceThreshold::new(threshold))
            }
            StrategyKind::CvdReversal => Box::new(CvdReversal::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::ImbalanceThreshold { .. } => "imbalance_threshold",
            StrategyKind::CvdReversal => "cvd_reversal",
        }
    }
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::ImbalanceThreshold {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::ImbalanceThreshold { threshold } => {
                write!(f, "imbalance_threshold({})", threshold)
            }
            StrategyKind::CvdReversal => write!(f, "cvd_reversal"),
        }
    }
}

/// Strategy names accepted on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyName {
    ImbalanceThreshold,
    CvdReversal,
}

impl StrategyName {
    pub fn with_threshold(self, threshold: f64) -> StrategyKind {
        match self {
            StrategyName::ImbalanceThreshold => StrategyKind::ImbalanceThreshold { threshold },
            StrategyName::CvdReversal => StrategyKind::CvdReversal,
        }
    }
}

impl FromStr for StrategyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "imbalance_threshold" | "imbalance" => Ok(StrategyName::ImbalanceThreshold),
            "cvd_reversal" | "cvd" => Ok(StrategyName::CvdReversal),
            other => Err(format!(
                "unknown strategy '{}' (expected imbalance_threshold or cvd_reversal)",
                other
            )),
        }
    }
}

/// Tally of signals emitted during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalCounts {
    pub long: usize,
    pub short: usize,
    pub flat: usize,
}

impl SignalCounts {
    pub fn record(&mut self, signal: Signal) {
        match signal {
            Signal::Long => self.long += 1,
            Signal::Short => self.short += 1,
            Signal::Flat => self.flat += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.long + self.short + self.flat
    }
}
