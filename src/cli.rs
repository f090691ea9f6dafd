//! CLI definition and dispatch.

use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use crate::adapters::csv_trade_adapter::{self, CsvTradeAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{Backtest, BacktestConfig, BacktestResult, FlushPolicy};
use crate::domain::config_validation::{
    KNOWN_KEYS, check_threshold, check_window, validate_backtest_config, validate_strategy_config,
};
use crate::domain::error::FlowtraderError;
use crate::domain::features::{self, DEFAULT_WINDOW};
use crate::domain::signal::{DEFAULT_THRESHOLD, StrategyName};
use crate::domain::summary::{FeatureSummary, LedgerSummary};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::trade_port::TradePort;

pub const DEFAULT_OUTPUT: &str = "trade_results.csv";

#[derive(Parser, Debug)]
#[command(name = "flowtrader", about = "Order-flow signal backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a strategy over a trade file and write the realized ledger
    Backtest(BacktestArgs),
    /// Compute CVD and order imbalance for a trade file
    Features {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_WINDOW)]
        window: usize,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct BacktestArgs {
    /// Trade CSV with time, price, volume and side columns
    #[arg(short, long)]
    pub input: Option<PathBuf>,
    /// INI file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Rolling window size in trades
    #[arg(short, long)]
    pub window: Option<usize>,
    /// imbalance_threshold or cvd_reversal
    #[arg(short, long)]
    pub strategy: Option<String>,
    #[arg(short, long)]
    pub threshold: Option<f64>,
    /// Realized trade ledger destination
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Unrealized mark-to-market snapshot destination
    #[arg(long)]
    pub marks: Option<PathBuf>,
    /// Append to the ledger every N closed trades instead of one write at the end
    #[arg(long)]
    pub flush_every: Option<usize>,
}

/// Fully resolved parameters for one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Required to run, optional when only validating a config.
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    pub marks_output: Option<PathBuf>,
    pub flush_every: usize,
    pub backtest: BacktestConfig,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest(args) => run_backtest(&args),
        Command::Features {
            input,
            window,
            output,
        } => run_features(&input, window, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, FlowtraderError> {
    info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    for key in adapter.unknown_keys(&KNOWN_KEYS) {
        warn!(key = %key, "ignoring unknown config key");
    }
    Ok(adapter)
}

fn invalid_arg(key: &str, reason: String) -> FlowtraderError {
    FlowtraderError::ConfigInvalid {
        section: "args".into(),
        key: key.into(),
        reason,
    }
}

/// Merge command-line flags over config values over defaults.
pub fn build_run_settings(
    args: &BacktestArgs,
    config: Option<&dyn ConfigPort>,
) -> Result<RunSettings, FlowtraderError> {
    let get = |section: &str, key: &str| config.and_then(|c| c.get_string(section, key));

    let input = args
        .input
        .clone()
        .or_else(|| get("backtest", "input").map(PathBuf::from));

    let window = match args.window {
        Some(w) => NonZeroUsize::new(w)
            .ok_or_else(|| invalid_arg("window", "window must be a positive integer".into()))?,
        None => {
            let w = config.map_or(DEFAULT_WINDOW as i64, |c| {
                c.get_int("backtest", "window", DEFAULT_WINDOW as i64)
            });
            check_window(w)
                .ok()
                .and_then(NonZeroUsize::new)
                .ok_or_else(|| FlowtraderError::ConfigInvalid {
                    section: "backtest".into(),
                    key: "window".into(),
                    reason: "window must be a positive integer".into(),
                })?
        }
    };

    let strategy_name: StrategyName = match &args.strategy {
        Some(s) => s.parse().map_err(|r| invalid_arg("strategy", r))?,
        None => match get("strategy", "name") {
            Some(s) => s.parse().map_err(|reason| FlowtraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "name".into(),
                reason,
            })?,
            None => StrategyName::ImbalanceThreshold,
        },
    };

    let threshold = match args.threshold {
        Some(t) => check_threshold(t).map_err(|r| invalid_arg("threshold", r))?,
        None => {
            let t = config.map_or(DEFAULT_THRESHOLD, |c| {
                c.get_double("strategy", "threshold", DEFAULT_THRESHOLD)
            });
            check_threshold(t).map_err(|reason| FlowtraderError::ConfigInvalid {
                section: "strategy".into(),
                key: "threshold".into(),
                reason,
            })?
        }
    };

    let output = args
        .output
        .clone()
        .or_else(|| get("backtest", "output").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let marks_output = args
        .marks
        .clone()
        .or_else(|| get("backtest", "marks_output").map(PathBuf::from));

    let flush_every = match args.flush_every {
        Some(n) => n,
        None => {
            let n = config.map_or(0, |c| c.get_int("backtest", "flush_every", 0));
            usize::try_from(n).map_err(|_| FlowtraderError::ConfigInvalid {
                section: "backtest".into(),
                key: "flush_every".into(),
                reason: "flush_every must be non-negative".into(),
            })?
        }
    };

    Ok(RunSettings {
        input,
        output,
        marks_output: marks_output.clone(),
        flush_every,
        backtest: BacktestConfig {
            window,
            strategy: strategy_name.with_threshold(threshold),
            record_marks: marks_output.is_some(),
        },
    })
}

/// Load, replay and persist. The ledger reaches `settings.output` either as
/// one atomic write at the end or, with `flush_every > 0`, in appended
/// batches after an atomic header-only reset.
pub fn run_backtest_pipeline(
    trade_port: &dyn TradePort,
    ledger_port: &dyn LedgerPort,
    settings: &RunSettings,
) -> Result<BacktestResult, FlowtraderError> {
    let trades = trade_port.load_trades()?;

    info!(
        trades = trades.len(),
        window = settings.backtest.window.get(),
        strategy = %settings.backtest.strategy,
        "running backtest"
    );

    let mut backtest = Backtest::new(&settings.backtest);
    if settings.flush_every > 0 {
        ledger_port.write_records(&[], &settings.output)?;
        let policy = FlushPolicy {
            port: ledger_port,
            destination: &settings.output,
            every: settings.flush_every,
        };
        backtest.process_all(&trades, Some(&policy))?;
    } else {
        backtest.process_all(&trades, None)?;
        backtest.ledger().persist(ledger_port, &settings.output)?;
    }

    let result = backtest.finish();
    if let Some(marks_path) = &settings.marks_output {
        ledger_port.write_marks(&result.marks, marks_path)?;
    }
    Ok(result)
}

fn run_backtest(args: &BacktestArgs) -> Result<(), FlowtraderError> {
    let config = match &args.config {
        Some(path) => {
            let adapter = load_config(path)?;
            validate_backtest_config(&adapter)?;
            validate_strategy_config(&adapter)?;
            Some(adapter)
        }
        None => None,
    };
    let settings = build_run_settings(args, config.as_ref().map(|c| c as &dyn ConfigPort))?;

    let input = settings
        .input
        .clone()
        .ok_or_else(|| FlowtraderError::ConfigMissing {
            section: "backtest".into(),
            key: "input".into(),
        })?;
    let trade_port = CsvTradeAdapter::new(input);
    let ledger_port = CsvLedgerAdapter::new();
    let result = run_backtest_pipeline(&trade_port, &ledger_port, &settings)?;

    print_backtest_summary(&result, &settings);
    Ok(())
}

pub fn print_backtest_summary(result: &BacktestResult, settings: &RunSettings) {
    let summary = LedgerSummary::compute(result.ledger.snapshot());
    let counts = &result.signal_counts;

    println!("=== {} ===", settings.backtest.strategy);
    println!("Rows processed:   {}", result.rows);
    println!(
        "Signals:          {} long, {} short, {} flat",
        counts.long, counts.short, counts.flat
    );
    println!("Closed trades:    {}", summary.total_trades);
    println!(
        "Won/Lost/Even:    {}/{}/{}",
        summary.trades_won, summary.trades_lost, summary.trades_breakeven
    );
    println!("Win rate:         {:.1}%", summary.win_rate * 100.0);
    println!("Total pnl:        {:.4}", summary.total_pnl);
    println!("Average pnl:      {:.4}", summary.avg_pnl);
    println!("Largest win:      {:.4}", summary.largest_win);
    println!("Largest loss:     {:.4}", summary.largest_loss);
    println!("Final cvd:        {:.6}", result.final_cvd);
    match result.ledger.latest_mark() {
        Some(mark) => println!(
            "Open position:    {} from {} (last {}, unrealized {:.4})",
            mark.side, mark.entry_price, mark.last_price, mark.unrealized_pnl
        ),
        None => println!("Open position:    none"),
    }
    println!("Ledger written to {}", settings.output.display());
    if let Some(marks) = &settings.marks_output {
        println!("Marks written to  {}", marks.display());
    }
}

fn run_features(input: &Path, window: usize, output: Option<&Path>) -> Result<(), FlowtraderError> {
    let window = NonZeroUsize::new(window)
        .ok_or_else(|| invalid_arg("window", "window must be a positive integer".into()))?;
    let trades = CsvTradeAdapter::new(input.to_path_buf()).load_trades()?;
    let rows = features::compute(&trades, window);

    if let Some(path) = output {
        csv_trade_adapter::write_enriched(&rows, path)?;
    }

    let summary = FeatureSummary::compute(&rows);
    println!("{}:", input.display());
    println!("Buy trades:  {}", summary.buy_trades);
    println!("Sell trades: {}", summary.sell_trades);
    println!("Final cvd:   {:.6}", summary.final_cvd);
    match summary.imbalance_range {
        Some((lo, hi)) => println!("Order imbalance range: {:.3} to {:.3}", lo, hi),
        None => println!("Order imbalance range: undefined"),
    }
    if summary.undefined_rows > 0 {
        println!("Rows with undefined imbalance: {}", summary.undefined_rows);
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), FlowtraderError> {
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter)?;
    validate_strategy_config(&adapter)?;

    let settings = build_run_settings(&BacktestArgs::default(), Some(&adapter))?;
    let input = settings
        .input
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string());

    println!("Input:     {}", input);
    println!("Window:    {}", settings.backtest.window);
    println!("Strategy:  {}", settings.backtest.strategy);
    println!("Output:    {}", settings.output.display());
    if let Some(marks) = &settings.marks_output {
        println!("Marks:     {}", marks.display());
    }
    println!("Flush:     {}", describe_flush(settings.flush_every));
    println!("\nConfiguration is valid.");
    Ok(())
}

fn describe_flush(every: usize) -> String {
    if every == 0 {
        "single write at end".to_string()
    } else {
        format!("every {} closed trades", every)
    }
}
