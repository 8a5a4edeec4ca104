//! Error Types
//!
//! Typed failures for each part of the session/query lifecycle. None of these
//! are fatal: catalog failures end at the log, query failures end in the
//! transcript, and session errors are rejected state transitions.

use thiserror::Error;

/// Failure to fetch or apply the vehicle listing
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    /// The request never produced a response
    #[error("vehicle listing request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status
    #[error("vehicle listing returned HTTP {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// The body did not match `{vehicles, available_vehicles}`
    #[error("vehicle listing body was malformed: {0}")]
    Malformed(String),

    /// The listing parsed but named no vehicles at all
    #[error("vehicle listing contained no vehicles")]
    Empty,
}

/// Failure of a single question/answer round trip
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No response was received
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("server returned HTTP {status}{}", detail_suffix(.detail))]
    Http {
        /// HTTP status code
        status: u16,
        /// `detail` field of the error body, if the backend sent one
        detail: Option<String>,
    },

    /// The body was missing `answer` or was not JSON
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl QueryError {
    /// Text shown to the user in place of an answer
    #[must_use]
    pub fn user_message(&self) -> String {
        format!("⚠️ 답변을 가져오지 못했습니다. ({self})\n\n잠시 후 다시 질문해 주세요.")
    }

    /// HTTP status, when the failure carried one
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(_) | Self::MalformedResponse(_) => None,
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {d}"))
        .unwrap_or_default()
}

/// Rejected session state transitions
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The code is unknown or not currently queryable
    #[error("vehicle '{0}' is not available for selection")]
    InvalidSelection(String),

    /// A vehicle is already selected; change vehicle first
    #[error("a vehicle is already selected")]
    AlreadyChatting,

    /// Messages can only be appended while chatting
    #[error("no vehicle is selected")]
    NotChatting,
}
