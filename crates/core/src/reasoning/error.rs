//! Error types for the reasoning client.

use std::time::Duration;
use thiserror::Error;

/// Transport-level failures of the reasoning service.
///
/// Every variant is fatal to the dispatch cycle and is reported exactly once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasoningError {
    /// The service could not be reached.
    #[error("cannot reach reasoning service: {reason}")]
    Connection { reason: String },

    /// The service did not answer (or went silent) within the bound.
    #[error("reasoning service timed out after {after:?}")]
    Timeout { after: Duration },

    /// The service answered with a non-success HTTP status.
    #[error("reasoning service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body broke off or carried an error payload.
    #[error("reasoning stream failed: {reason}")]
    Stream { reason: String },
}

impl ReasoningError {
    pub fn connection(reason: impl Into<String>) -> Self {
        Self::Connection {
            reason: reason.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Timeout { after }
    }

    pub fn stream(reason: impl Into<String>) -> Self {
        Self::Stream {
            reason: reason.into(),
        }
    }

    /// Classify a reqwest failure; `bound` is the timeout that was in force.
    pub fn from_transport(err: &reqwest::Error, bound: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(bound)
        } else if err.is_connect() || err.is_request() {
            Self::connection(err.to_string())
        } else {
            Self::stream(err.to_string())
        }
    }
}
