//! Integration tests for the backtest engine.
//!
//! Tests cover:
//! - Feature invariants (CVD recurrence, imbalance bounds, determinism) via proptest
//! - Threshold strategy decision points
//! - State machine scenarios: flat-holds, reversal
//! - Ledger persist/reload round trip and incremental flush through the CSV adapter
//! - Full pipeline from a trade CSV on disk

mod common;

use approx::assert_relative_eq;
use common::*;
use flowtrader::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use flowtrader::adapters::csv_trade_adapter::{read_trades, write_enriched};
use flowtrader::domain::backtest::{Backtest, BacktestConfig, FlushPolicy, run_backtest};
use flowtrader::domain::features::compute;
use flowtrader::domain::position::{PositionSide, TradeSide};
use flowtrader::domain::signal::{ImbalanceThreshold, Signal, StrategyKind};
use flowtrader::domain::state_machine::PositionStateMachine;
use flowtrader::ports::ledger_port::LedgerPort;
use proptest::prelude::*;
use std::fs;
use std::num::NonZeroUsize;

fn window(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn arb_trades() -> impl Strategy<Value = Vec<Trade>> {
    prop::collection::vec((1.0f64..1000.0, 0.0f64..50.0, any::<bool>()), 0..200).prop_map(
        |rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (price, volume, is_buy))| {
                    let side = if is_buy { Side::Buy } else { Side::Sell };
                    make_trade(i as i64, price, volume, side)
                })
                .collect()
        },
    )
}

mod feature_invariants {
    use super::*;

    proptest! {
        #[test]
        fn cvd_is_running_sum_of_delta(trades in arb_trades(), w in 1usize..80) {
            let rows = compute(&trades, window(w));
            prop_assert_eq!(rows.len(), trades.len());
            for (i, row) in rows.iter().enumerate() {
                prop_assert_eq!(row.volume_delta, row.buy_volume - row.sell_volume);
                if i == 0 {
                    prop_assert_eq!(row.cvd, row.volume_delta);
                } else {
                    prop_assert_eq!(row.cvd, rows[i - 1].cvd + row.volume_delta);
                }
            }
        }

        #[test]
        fn imbalance_bounded_when_defined(trades in arb_trades(), w in 1usize..80) {
            for row in compute(&trades, window(w)) {
                let total = row.rolling_buy_sum + row.rolling_sell_sum;
                match row.order_imbalance {
                    Some(oi) => {
                        prop_assert!(total > 0.0);
                        prop_assert!((-1.0..=1.0).contains(&oi));
                    }
                    None => prop_assert_eq!(total, 0.0),
                }
            }
        }

        #[test]
        fn rolling_sums_match_trailing_definition(trades in arb_trades(), w in 1usize..30) {
            let rows = compute(&trades, window(w));
            for (i, row) in rows.iter().enumerate() {
                let start = (i + 1).saturating_sub(w);
                let buy: f64 = trades[start..=i].iter().map(|t| t.buy_volume()).sum();
                let sell: f64 = trades[start..=i].iter().map(|t| t.sell_volume()).sum();
                prop_assert_eq!(row.rolling_buy_sum, buy);
                prop_assert_eq!(row.rolling_sell_sum, sell);
            }
        }

        #[test]
        fn compute_is_deterministic(trades in arb_trades(), w in 1usize..80) {
            prop_assert_eq!(compute(&trades, window(w)), compute(&trades, window(w)));
        }
    }

    #[test]
    fn feature_export_is_byte_identical_across_runs() {
        let trades: Vec<Trade> = (0..120)
            .map(|i| {
                let side = if i % 3 == 0 { Side::Sell } else { Side::Buy };
                make_trade(i, 100.0 + (i % 7) as f64 * 0.1, 0.013 * (i % 5) as f64, side)
            })
            .collect();
        let dir = tempfile::TempDir::new().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");
        write_enriched(&compute(&trades, window(50)), &a).unwrap();
        write_enriched(&compute(&trades, window(50)), &b).unwrap();
        assert_eq!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }
}

mod strategy_decisions {
    use super::*;

    #[test]
    fn threshold_point_two() {
        let g = ImbalanceThreshold::new(0.2);
        assert_eq!(g.signal_for(Some(0.25)), Signal::Long);
        assert_eq!(g.signal_for(Some(0.15)), Signal::Flat);
        assert_eq!(g.signal_for(Some(-0.3)), Signal::Short);
        assert_eq!(g.signal_for(None), Signal::Flat);
    }
}

mod state_machine_scenarios {
    use super::*;

    #[test]
    fn flat_never_forces_a_close() {
        let trades = trades_at(&[100.0, 100.0, 105.0, 95.0]);
        let script = ScriptedSignals::new(vec![
            Signal::Flat,
            Signal::Long,
            Signal::Flat,
            Signal::Short,
        ]);
        let mut bt = Backtest::with_generator(&BacktestConfig::default(), Box::new(script));

        bt.process(&trades[0]);
        bt.process(&trades[1]);
        let third = bt.process(&trades[2]);
        assert!(third.closed.is_none());
        assert_eq!(bt.side(), PositionSide::Long);
        bt.process(&trades[3]);

        let result = bt.finish();
        let records = result.ledger.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].side, TradeSide::Long);
        assert_eq!(records[0].entry_price, 100.0);
        assert_eq!(records[0].entry_time, trades[1].time);
        assert_eq!(records[0].exit_price, 95.0);
        assert_eq!(records[0].exit_time, trades[3].time);
        assert_relative_eq!(records[0].pnl, -5.0);
    }

    #[test]
    fn reversal_closes_long_and_opens_short() {
        let trades = trades_at(&[100.0, 90.0]);
        let script = ScriptedSignals::new(vec![Signal::Long, Signal::Short]);
        let mut bt = Backtest::with_generator(&BacktestConfig::default(), Box::new(script));
        for t in &trades {
            bt.process(t);
        }
        let result = bt.finish();
        let records = result.ledger.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].side, TradeSide::Long);
        assert_eq!(records[0].entry_price, 100.0);
        assert_eq!(records[0].exit_price, 90.0);
        assert_relative_eq!(records[0].pnl, -10.0);

        let open = result.open_position.unwrap();
        assert_eq!(open.side, TradeSide::Short);
        assert_eq!(open.entry_price, 90.0);
        assert_eq!(open.entry_time, trades[1].time);
    }

    #[test]
    fn position_side_is_always_exactly_one_state() {
        let rows = compute(&trades_at(&[1.0, 2.0, 3.0, 4.0, 5.0]), window(2));
        let signals = [Signal::Short, Signal::Long, Signal::Flat, Signal::Long, Signal::Short];
        let mut sm = PositionStateMachine::new();
        let mut closed = 0;
        for (row, signal) in rows.iter().zip(signals) {
            let t = sm.step(row, signal);
            closed += t.closed.iter().count();
            match sm.side() {
                PositionSide::Flat => assert!(sm.position().is_none()),
                PositionSide::Long => assert!(sm.position().unwrap().is_long()),
                PositionSide::Short => assert!(sm.position().unwrap().is_short()),
            }
        }
        // short->long on row 1, long->short on row 4
        assert_eq!(closed, 2);
    }
}

mod persistence {
    use super::*;

    #[test]
    fn persist_then_reload_round_trips() {
        let trades: Vec<Trade> = [
            (100.25, 2.0, Side::Buy),
            (100.5, 1.0, Side::Sell),
            (99.75, 4.0, Side::Sell),
            (99.5, 0.5, Side::Buy),
            (101.125, 6.0, Side::Buy),
            (100.0, 9.0, Side::Sell),
        ]
        .iter()
        .enumerate()
        .map(|(i, (p, v, s))| make_trade(i as i64, *p, *v, *s))
        .collect();
        let config = BacktestConfig {
            window: window(2),
            ..BacktestConfig::default()
        };
        let result = run_backtest(&trades, &config);
        assert!(result.ledger.len() >= 2);

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        let port = CsvLedgerAdapter::new();
        result.ledger.persist(&port, &path).unwrap();

        let reloaded = port.read_records(&path).unwrap();
        assert_eq!(reloaded, result.ledger.snapshot().to_vec());
    }

    #[test]
    fn incremental_flush_matches_single_write() {
        let trades: Vec<Trade> = (0..60)
            .map(|i| {
                let side = if (i / 3) % 2 == 0 { Side::Buy } else { Side::Sell };
                make_trade(i, 100.0 + i as f64, 1.0, side)
            })
            .collect();
        let config = BacktestConfig {
            window: window(1),
            ..BacktestConfig::default()
        };
        let port = CsvLedgerAdapter::new();
        let dir = tempfile::TempDir::new().unwrap();

        let whole = dir.path().join("whole.csv");
        let expected = run_backtest(&trades, &config);
        expected.ledger.persist(&port, &whole).unwrap();

        let streamed = dir.path().join("streamed.csv");
        let mut bt = Backtest::new(&config);
        let policy = FlushPolicy {
            port: &port,
            destination: &streamed,
            every: 3,
        };
        bt.process_all(&trades, Some(&policy)).unwrap();
        assert!(bt.ledger().pending().is_empty());

        assert!(expected.ledger.len() > 3);
        assert_eq!(fs::read(&whole).unwrap(), fs::read(&streamed).unwrap());
    }

    #[test]
    fn marks_stay_out_of_the_ledger_file() {
        let trades = trades_at(&[100.0, 101.0, 102.0]);
        let config = BacktestConfig {
            window: window(1),
            record_marks: true,
            ..BacktestConfig::default()
        };
        let result = run_backtest(&trades, &config);
        assert!(result.ledger.is_empty());
        assert_eq!(result.marks.len(), 3);

        let dir = tempfile::TempDir::new().unwrap();
        let ledger_path = dir.path().join("ledger.csv");
        let marks_path = dir.path().join("marks.csv");
        let port = CsvLedgerAdapter::new();
        result.ledger.persist(&port, &ledger_path).unwrap();
        port.write_marks(&result.marks, &marks_path).unwrap();

        assert_eq!(fs::read_to_string(&ledger_path).unwrap().lines().count(), 1);
        assert_eq!(fs::read_to_string(&marks_path).unwrap().lines().count(), 4);
    }
}

mod from_csv {
    use super::*;

    #[test]
    fn csv_trades_through_imbalance_strategy() {
        let csv = trades_csv(&[
            (84000.0, 1.0, Side::Buy),
            (84010.0, 1.0, Side::Buy),
            (84005.0, 5.0, Side::Sell),
            (83990.0, 1.0, Side::Sell),
        ]);
        let trades = read_trades(csv.as_bytes()).unwrap();
        let config = BacktestConfig {
            window: window(3),
            strategy: StrategyKind::ImbalanceThreshold { threshold: 0.2 },
            record_marks: false,
        };
        let result = run_backtest(&trades, &config);
        // rows 0-1 long, row 2 oi = (2-5)/7 short: reverse at 84005
        assert_eq!(result.signal_counts.long, 2);
        assert_eq!(result.signal_counts.short, 2);
        assert_eq!(result.ledger.len(), 1);
        let r = &result.ledger.snapshot()[0];
        assert_eq!(r.entry_price, 84000.0);
        assert_eq!(r.exit_price, 84005.0);
        assert_relative_eq!(r.pnl, 5.0);
        assert_eq!(result.open_position.unwrap().side, TradeSide::Short);
    }
}
