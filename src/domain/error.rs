//! Domain error types.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Recoverable, expected-in-normal-operation conditions raised by the ledger.
/// The orchestrator catches these per candidate and moves on to the next.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("max positions reached ({limit})")]
    CapacityExceeded { limit: usize },

    #[error("position already open for {symbol}")]
    DuplicateSymbol { symbol: String },

    #[error("insufficient capital: need {needed:.2}, have {available:.2}")]
    InsufficientCapital { needed: f64, available: f64 },

    #[error("unknown position id {0}")]
    UnknownPosition(u64),
}

impl LedgerError {
    /// `InsufficientCapital` stores floats; compare on variant for tests.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::CapacityExceeded { .. } => "capacity_exceeded",
            LedgerError::DuplicateSymbol { .. } => "duplicate_symbol",
            LedgerError::InsufficientCapital { .. } => "insufficient_capital",
            LedgerError::UnknownPosition(_) => "unknown_position",
        }
    }
}

/// Top-level error type for minuteman.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("malformed bar series for {symbol}: {reason}")]
    MalformedSeries { symbol: String, reason: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid strategy '{name}': {reason}")]
    InvalidStrategy { name: String, reason: String },

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

    #[error("execution gateway error: {reason}")]
    Gateway { reason: String },

    #[error("no bar data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::RuleParse(_) | EngineError::InvalidStrategy { .. } => 3,
            EngineError::MalformedSeries { .. } | EngineError::NoData { .. } => 4,
            EngineError::Gateway { .. } => 5,
            EngineError::Ledger(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
