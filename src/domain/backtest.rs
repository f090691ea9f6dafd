//! Backtest driver: trades -> features -> signals -> positions -> ledger.
//!
//! BacktestConfig defines the run parameters. [`Backtest`] advances one trade
//! at a time so the same code serves batch replays and live feeds.

use std::num::NonZeroUsize;
use std::path::Path;

use tracing::debug;

use super::error::FlowtraderError;
use super::features::{DEFAULT_WINDOW, FeatureEngine};
use super::ledger::TradeLedger;
use super::position::{MarkToMarket, Position, PositionSide};
use super::signal::{SignalCounts, SignalGenerator, StrategyKind};
use super::state_machine::{PositionStateMachine, Transition};
use super::trade::Trade;
use crate::ports::ledger_port::LedgerPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub window: NonZeroUsize,
    pub strategy: StrategyKind,
    /// Keep every per-row unrealized snapshot, not just the latest.
    pub record_marks: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            window: NonZeroUsize::new(DEFAULT_WINDOW).unwrap_or(NonZeroUsize::MIN),
            strategy: StrategyKind::default(),
            record_marks: false,
        }
    }
}

/// Periodic incremental persistence of the ledger.
pub struct FlushPolicy<'a> {
    pub port: &'a dyn LedgerPort,
    pub destination: &'a Path,
    /// Flush once this many records are pending.
    pub every: usize,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub ledger: TradeLedger,
    pub marks: Vec<MarkToMarket>,
    pub signal_counts: SignalCounts,
    pub open_position: Option<Position>,
    pub rows: usize,
    pub final_cvd: f64,
}

pub struct Backtest {
    features: FeatureEngine,
    generator: Box<dyn SignalGenerator>,
    machine: PositionStateMachine,
    ledger: TradeLedger,
    marks: Vec<MarkToMarket>,
    record_marks: bool,
    signal_counts: SignalCounts,
    rows: usize,
}

impl Backtest {
    pub fn new(config: &BacktestConfig) -> Self {
        Self::with_generator(config, config.strategy.build())
    }

    pub fn with_generator(config: &BacktestConfig, generator: Box<dyn SignalGenerator>) -> Self {
        Self {
            features: FeatureEngine::new(config.window),
            generator,
            machine: PositionStateMachine::new(),
            ledger: TradeLedger::new(),
            marks: Vec::new(),
            record_marks: config.record_marks,
            signal_counts: SignalCounts::default(),
            rows: 0,
        }
    }

    /// Process one trade. Must be called in time order.
    pub fn process(&mut self, trade: &Trade) -> Transition {
        let row = self.features.push(trade);
        let signal = self.generator.evaluate(&row);
        self.signal_counts.record(signal);
        let transition = self.machine.step(&row, signal);

        if let Some(record) = &transition.closed {
            self.ledger.append(record.clone());
        }
        self.ledger.set_mark(transition.mark.clone());
        if self.record_marks {
            if let Some(mark) = &transition.mark {
                self.marks.push(mark.clone());
            }
        }
        self.rows += 1;
        transition
    }

    /// Process a batch, flushing new records whenever `flush.every` of them
    /// are pending and once more at the end.
    pub fn process_all(
        &mut self,
        trades: &[Trade],
        flush: Option<&FlushPolicy<'_>>,
    ) -> Result<(), FlowtraderError> {
        for trade in trades {
            self.process(trade);
            if let Some(policy) = flush {
                if policy.every > 0 && self.ledger.pending().len() >= policy.every {
                    self.ledger.flush(policy.port, policy.destination)?;
                }
            }
        }
        if let Some(policy) = flush {
            self.ledger.flush(policy.port, policy.destination)?;
        }
        Ok(())
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn side(&self) -> PositionSide {
        self.machine.side()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.generator.name()
    }

    pub fn finish(self) -> BacktestResult {
        debug!(
            rows = self.rows,
            closed = self.ledger.len(),
            side = %self.machine.side(),
            "backtest finished"
        );
        BacktestResult {
            open_position: self.machine.position().cloned(),
            final_cvd: self.features.cvd(),
            ledger: self.ledger,
            marks: self.marks,
            signal_counts: self.signal_counts,
            rows: self.rows,
        }
    }
}

/// Replay `trades` with the configured strategy and return the outcome.
pub fn run_backtest(trades: &[Trade], config: &BacktestConfig) -> BacktestResult {
    let mut backtest = Backtest::new(config);
    for trade in trades {
        backtest.process(trade);
    }
    backtest.finish()
}
