//! Configuration validation.
//!
//! Validates all config fields before a backtest runs.

use crate::domain::error::FlowtraderError;
use crate::domain::signal::StrategyName;
use crate::ports::config_port::ConfigPort;

/// Every `(section, key)` a config file may set.
pub const KNOWN_KEYS: [(&str, &str); 7] = [
    ("backtest", "input"),
    ("backtest", "window"),
    ("backtest", "output"),
    ("backtest", "marks_output"),
    ("backtest", "flush_every"),
    ("strategy", "name"),
    ("strategy", "threshold"),
];

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FlowtraderError> {
    validate_window(config)?;
    validate_flush_every(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), FlowtraderError> {
    validate_strategy_name(config)?;
    validate_threshold(config)?;
    Ok(())
}

/// Checks an explicitly set threshold: finite and within [0, 1].
pub fn check_threshold(value: f64) -> Result<f64, String> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err("threshold must be between 0 and 1".to_string());
    }
    Ok(value)
}

pub fn check_window(value: i64) -> Result<usize, String> {
    if value < 1 {
        return Err("window must be a positive integer".to_string());
    }
    usize::try_from(value).map_err(|_| "window is too large".to_string())
}

fn invalid(section: &str, key: &str, reason: String) -> FlowtraderError {
    FlowtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

/// A key that is present must parse; `get_int`/`get_double` alone would
/// silently fall back to the default.
fn require_numeric<T: std::str::FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, FlowtraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not a number", raw.trim()))),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), FlowtraderError> {
    if let Some(value) = require_numeric::<i64>(config, "backtest", "window")? {
        check_window(value).map_err(|reason| invalid("backtest", "window", reason))?;
    }
    Ok(())
}

fn validate_flush_every(config: &dyn ConfigPort) -> Result<(), FlowtraderError> {
    if let Some(value) = require_numeric::<i64>(config, "backtest", "flush_every")? {
        if value < 0 {
            return Err(invalid(
                "backtest",
                "flush_every",
                "flush_every must be non-negative".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_strategy_name(config: &dyn ConfigPort) -> Result<(), FlowtraderError> {
    if let Some(name) = config.get_string("strategy", "name") {
        name.parse::<StrategyName>()
            .map_err(|reason| invalid("strategy", "name", reason))?;
    }
    Ok(())
}

fn validate_threshold(config: &dyn ConfigPort) -> Result<(), FlowtraderError> {
    if let Some(value) = require_numeric::<f64>(config, "strategy", "threshold")? {
        check_threshold(value).map_err(|reason| invalid("strategy", "threshold", reason))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: FlowtraderError) -> String {
        match err {
            FlowtraderError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_is_valid() {
        let c = config("[backtest]\n");
        assert!(validate_backtest_config(&c).is_ok());
        assert!(validate_strategy_config(&c).is_ok());
    }

    #[test]
    fn full_config_is_valid() {
        let c = config(
            "[backtest]\nwindow = 20\nflush_every = 10\n\
             [strategy]\nname = cvd_reversal\nthreshold = 0.35\n",
        );
        assert!(validate_backtest_config(&c).is_ok());
        assert!(validate_strategy_config(&c).is_ok());
    }

    #[test]
    fn zero_window_rejected() {
        let c = config("[backtest]\nwindow = 0\n");
        assert_eq!(invalid_key(validate_backtest_config(&c).unwrap_err()), "window");
    }

    #[test]
    fn non_numeric_window_rejected() {
        let c = config("[backtest]\nwindow = fifty\n");
        assert_eq!(invalid_key(validate_backtest_config(&c).unwrap_err()), "window");
    }

    #[test]
    fn negative_flush_every_rejected() {
        let c = config("[backtest]\nflush_every = -1\n");
        assert_eq!(
            invalid_key(validate_backtest_config(&c).unwrap_err()),
            "flush_every"
        );
    }

    #[test]
    fn unknown_strategy_rejected() {
        let c = config("[strategy]\nname = martingale\n");
        assert_eq!(invalid_key(validate_strategy_config(&c).unwrap_err()), "name");
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        for bad in ["-0.1", "1.5", "NaN"] {
            let c = config(&format!("[strategy]\nthreshold = {bad}\n"));
            assert_eq!(
                invalid_key(validate_strategy_config(&c).unwrap_err()),
                "threshold"
            );
        }
    }

    #[test]
    fn check_helpers() {
        assert_eq!(check_window(50), Ok(50));
        assert!(check_window(0).is_err());
        assert_eq!(check_threshold(0.0), Ok(0.0));
        assert_eq!(check_threshold(1.0), Ok(1.0));
        assert!(check_threshold(f64::INFINITY).is_err());
    }
}
