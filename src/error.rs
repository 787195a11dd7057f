//! Error taxonomy for the gateway.
//!
//! `Validation` maps to 400; everything else maps to 500 with the underlying
//! message in the body. Remote errors deliberately carry the upstream
//! service's message through to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),

    /// The remote assistant service rejected or failed a call.
    #[error("{message}")]
    Remote { message: String, error_type: String },

    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A run finished in a terminal state other than `completed`.
    #[error("run ended with status {0}")]
    RunFailed(String),

    /// The run did not reach a terminal state within the polling budget.
    #[error("run did not complete within {0} polls")]
    RunTimedOut(u32),

    /// A vector store file batch finished in a non-completed state.
    #[error("file batch ended with status {0}")]
    BatchFailed(String),

    /// The file batch did not finish indexing within the polling budget.
    #[error("file batch did not complete within {0} polls")]
    BatchTimedOut(u32),

    /// The completed run produced no readable assistant message.
    #[error("no assistant reply found on thread {0}")]
    EmptyReply(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GatewayError::Validation(_))
    }
}
