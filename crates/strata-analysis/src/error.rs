//! Analysis error types

use thiserror::Error;

/// Errors surfaced to analysis callers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// The request did not resolve within its timeout
    #[error("Analysis timed out")]
    Timeout,

    /// The worker died while the request was pending
    #[error("Analysis worker lost")]
    WorkerLost,

    /// The request was cancelled (by id, or by client shutdown)
    #[error("Analysis cancelled")]
    Cancelled,

    /// The request could not be analyzed
    #[error("Invalid analysis input: {0}")]
    InvalidInput(String),
}
