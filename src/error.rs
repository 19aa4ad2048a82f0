use crate::types::Timeframe;
use thiserror::Error;

/// Signal engine error types.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("Retrieval failed for {instrument} ({timeframe}): {message}")]
    Retrieval {
        instrument: String,
        timeframe: Timeframe,
        message: String,
    },

    #[error("Timed out after {timeout_ms}ms fetching {instrument} ({timeframe})")]
    Timeout {
        instrument: String,
        timeframe: Timeframe,
        timeout_ms: u64,
    },

    #[error("Insufficient history: need {required} bars, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SignalError {
    /// Whether this error came from the data source (network, timeout, payload).
    pub fn is_retrieval(&self) -> bool {
        matches!(
            self,
            SignalError::Retrieval { .. }
                | SignalError::Timeout { .. }
                | SignalError::InvalidSeries(_)
                | SignalError::Http(_)
                | SignalError::Json(_)
        )
    }

    /// Whether this error means the instrument has too few bars to classify.
    pub fn is_insufficient_history(&self) -> bool {
        matches!(self, SignalError::InsufficientHistory { .. })
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
