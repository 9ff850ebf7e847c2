use thiserror::Error;

use crate::contest::UnknownContest;
use crate::validation::{Field, Violations};

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The client has used up its submissions for the current window.
    #[error("too many submissions from {client}")]
    RateLimited { client: String },

    /// The request body is bigger than a registration can be.
    #[error("request body larger than {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// The request body couldn't be read from the connection.
    #[error("failed to read request body")]
    UnreadableBody(#[source] warp::Error),

    /// The request body isn't a registration.
    #[error("malformed registration")]
    MalformedRegistration(#[source] serde_json::Error),

    /// Name or WhatsApp number is missing entirely.
    #[error("name and WhatsApp number are required")]
    MissingFields,

    /// The registration breaks one or more field rules.
    #[error("invalid registration: {0}")]
    InvalidRegistration(Violations),

    /// The admin query names a contest that doesn't exist.
    #[error("invalid contest filter")]
    InvalidContestFilter(#[source] UnknownContest),

    /// The admin credential is missing or wrong.
    #[error("unauthorized")]
    Unauthorized,

    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx {
        #[source]
        source: sqlx::Error,
    },
}

impl BackendError {
    /// The message that may be shown to the client. Internal failures
    /// are described only in the logs.
    pub fn public_message(&self) -> String {
        use BackendError::*;

        match self {
            RateLimited { .. } => "Too many requests. Please try again later.".to_owned(),
            PayloadTooLarge { .. } => "Registration is too large".to_owned(),
            UnreadableBody(_) | MalformedRegistration(_) => "Invalid registration data".to_owned(),
            MissingFields => "Name and WhatsApp number are required".to_owned(),
            InvalidRegistration(violations) => violations.to_string(),
            InvalidContestFilter(e) => format!("Invalid contest filter: {}", e.0),
            Unauthorized => "Unauthorized".to_owned(),
            Sqlx { .. } => "Internal server error. Please try again.".to_owned(),
        }
    }

    /// The field at fault, for validation failures.
    pub fn field(&self) -> Option<Field> {
        match self {
            BackendError::InvalidRegistration(violations) => Some(violations.first().field),
            _ => None,
        }
    }
}

/// Enumerates failures of the notification channels. These are only
/// ever logged.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The request couldn't be sent or its response couldn't be read.
    #[error("request to {sink} failed")]
    Request {
        sink: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The remote end answered with a non-success status.
    #[error("{sink} answered with status {status}")]
    Status {
        sink: &'static str,
        status: reqwest::StatusCode,
    },

    /// The attempt didn't finish within the configured bound.
    #[error("{sink} timed out")]
    TimedOut { sink: &'static str },
}
