//! Domain error types.

use std::path::Path;

/// Top-level error type for flowtrader.
#[derive(Debug, thiserror::Error)]
pub enum FlowtraderError {
    #[error("input is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    #[error("cannot read input {path}: {reason}")]
    Input { path: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to persist {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FlowtraderError {
    pub fn persist(path: &Path, reason: impl ToString) -> Self {
        FlowtraderError::Persist {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        FlowtraderError::MalformedRow {
            line,
            reason: reason.into(),
        }
    }
}

impl FlowtraderError {
    /// Process exit status for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            FlowtraderError::Io(_) => 1,
            FlowtraderError::ConfigParse { .. }
            | FlowtraderError::ConfigMissing { .. }
            | FlowtraderError::ConfigInvalid { .. } => 2,
            FlowtraderError::MissingColumn { .. }
            | FlowtraderError::MalformedRow { .. }
            | FlowtraderError::Input { .. } => 3,
            FlowtraderError::Persist { .. } => 4,
        }
    }
}

impl From<&FlowtraderError> for std::process::ExitCode {
    fn from(err: &FlowtraderError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_column_message_names_column() {
        let err = FlowtraderError::MissingColumn {
            column: "side".into(),
        };
        assert_eq!(err.to_string(), "input is missing required column 'side'");
    }

    #[test]
    fn malformed_row_message_has_line() {
        let err = FlowtraderError::malformed(7, "price must be positive");
        assert_eq!(
            err.to_string(),
            "malformed row at line 7: price must be positive"
        );
    }

    #[test]
    fn persist_helper_formats_path() {
        let err = FlowtraderError::persist(&PathBuf::from("/tmp/out.csv"), "disk full");
        assert!(matches!(err, FlowtraderError::Persist { ref path, .. } if path == "/tmp/out.csv"));
        assert_eq!(err.to_string(), "failed to persist /tmp/out.csv: disk full");
    }

    #[test]
    fn io_converts_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FlowtraderError = io.into();
        assert_eq!(err.to_string(), "gone");
    }

    #[test]
    fn exit_codes_by_class() {
        let io: FlowtraderError = std::io::Error::other("x").into();
        assert_eq!(io.exit_code(), 1);
        let cfg = FlowtraderError::ConfigMissing {
            section: "backtest".into(),
            key: "input".into(),
        };
        assert_eq!(cfg.exit_code(), 2);
        assert_eq!(FlowtraderError::malformed(2, "bad").exit_code(), 3);
        assert_eq!(
            FlowtraderError::persist(&PathBuf::from("a.csv"), "full").exit_code(),
            4
        );
    }
}
