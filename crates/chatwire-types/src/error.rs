use thiserror::Error;

/// Errors that end a streaming chat request.
///
/// Cancellation is not represented here: a cancelled request simply stops
/// producing events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not logged in or not authorized (status {status})")]
    Unauthenticated { status: u16 },

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl StreamError {
    /// Map a non-success status code to an error.
    ///
    /// `auth_codes` lists the codes that mean "credentials missing or
    /// rejected"; the backend also returns application-level codes such as
    /// 40100 as the HTTP status.
    pub fn from_status(status: u16, body: String, auth_codes: &[u16]) -> Self {
        if auth_codes.contains(&status) {
            StreamError::Unauthenticated { status }
        } else {
            StreamError::Status { status, body }
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, StreamError::Unauthenticated { .. })
    }
}

/// Errors from the key/value backing store.
///
/// Always recovered locally by the conversation store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("corrupt value under '{key}': {message}")]
    Corrupt { key: String, message: String },

    #[error("failed to encode value for '{key}': {message}")]
    Encode { key: String, message: String },
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io(err.to_string())
    }
}
