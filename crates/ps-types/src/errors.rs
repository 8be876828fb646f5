use thiserror::Error;

/// Main error type for Paramsweep
#[derive(Error, Debug)]
pub enum PsError {
    #[error("Sweep error: {0}")]
    Sweep(#[from] SweepError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Job runner error: {0}")]
    Runner(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised by the search-and-scoring core
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid parameter set: {message}")]
    InvalidParameterSet { message: String },

    #[error("Invalid train budget {train}: must be at least 1")]
    InvalidTrainBudget { train: usize },

    #[error("Malformed metric: {message}")]
    MalformedMetric { message: String },

    #[error("Configuration has no recorded score: {config}")]
    UnscoredConfiguration { config: String },

    #[error("Parameter order exhausted after {count} parameters")]
    ExhaustedParameterOrder { count: usize },

    #[error("Persisted sweeper state is corrupt: {message}")]
    PersistenceCorruption { message: String },

    #[error("Invalid state transition for {config}: {message}")]
    InvalidTransition { config: String, message: String },
}

impl SweepError {
    pub fn malformed_metric(message: impl Into<String>) -> Self {
        Self::MalformedMetric { message: message.into() }
    }

    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameterSet { message: message.into() }
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::PersistenceCorruption { message: message.into() }
    }
}

/// Result type alias for Paramsweep operations
pub type PsResult<T> = Result<T, PsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::PsError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PsError::Config(format!($($arg)*))
    };
}
