use thiserror::Error;

/// Errors raised by the probability and staking engine.
///
/// Per-record problems (a bad quote, a fixture with a broken rate) are absorbed
/// by the pipeline; these only escape for bad configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid expected-goals rate: {0}")]
    InvalidRate(f64),

    #[error("goal cap must be at least 1")]
    InvalidGoalCap,

    #[error("invalid stake bounds: min {min} / max {max}")]
    InvalidStakeBounds { min: f64, max: f64 },

    #[error("invalid bankroll: {0}")]
    InvalidBankroll(f64),

    #[error("invalid edge threshold: {0}")]
    InvalidEdgeThreshold(f64),

    #[error("invalid line: {0}")]
    InvalidLine(f64),

    #[error("unrecognised market tag: {0}")]
    UnknownMarket(String),

    #[error("unrecognised selection: {0}")]
    UnknownSelection(String),

    #[error("selection {selection} is not valid for market {market}")]
    InvalidSelection { market: String, selection: String },

    #[error("invalid price {0}: decimal odds must be finite and above 1.0")]
    InvalidPrice(f64),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
