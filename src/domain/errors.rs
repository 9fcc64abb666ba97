use thiserror::Error;

/// Errors raised while building settings, catalogs and sessions
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Variant catalog is empty")]
    EmptyCatalog,

    #[error("max_rounds must be at least 1")]
    ZeroRounds,

    #[error("max_concurrent must be at least 1")]
    ZeroConcurrency,

    #[error("search.simulations must be at least 1")]
    ZeroSimulations,

    #[error("No instruments given")]
    NoInstruments,

    #[error("Unknown variant: {id}")]
    UnknownVariant { id: String },

    #[error("Duplicate variant id: {id}")]
    DuplicateVariant { id: String },

    #[error("Invalid instrument identifier: '{instrument}'")]
    InvalidInstrument { instrument: String },
}

/// Errors related to market data retrieval
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Fetch for {instrument} timed out after {duration_ms}ms")]
    Timeout { instrument: String, duration_ms: u64 },

    #[error("Market data unavailable for {instrument}: {reason}")]
    Unavailable { instrument: String, reason: String },

    #[error("Malformed market data for {instrument}: {reason}")]
    Malformed { instrument: String, reason: String },
}

/// Errors raised by a single workflow execution at one backtest step
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Step {step} requires {missing} which has not been produced yet")]
    MissingInput { step: String, missing: String },

    #[error("Not enough history for {step}: have {available} bars, need {required}")]
    InsufficientHistory {
        step: String,
        available: usize,
        required: usize,
    },

    #[error("Provider failure in {step}: {reason}")]
    Provider { step: String, reason: String },

    #[error("Workflow finished without a prediction")]
    NoPrediction,
}

/// Errors from the text-generation path of candidate generation
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Text generation service not configured")]
    Unavailable,

    #[error("Text generation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("Text generation request failed: {reason}")]
    Request { reason: String },

    #[error("Malformed text generation reply: {reason}")]
    Malformed { reason: String },

    #[error("Reply '{reply}' does not name an admissible variant")]
    NotInCatalog { reply: String },
}

/// Errors that fail a single optimization round
#[derive(Debug, Error)]
pub enum RoundError {
    /// Skipped because a stop was requested before the round began
    #[error("stopped")]
    Stopped,

    #[error("Round panicked: {reason}")]
    Panicked { reason: String },
}
