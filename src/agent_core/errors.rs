//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that abort a whole chat request.
///
/// Tool failures are NOT here: they become error tool results and the
/// conversation goes on.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model backend could not produce a reply.
    #[error("model transport failed: {0}")]
    Transport(#[from] InferenceError),

    /// The request itself is unusable (e.g. empty message list).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Session store read or write failed.
    #[error("session store error: {reason}")]
    Session { reason: String },
}
