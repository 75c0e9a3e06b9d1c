use reqwest::StatusCode;
use thiserror::Error;

use crate::store::error::StorageError;

/// Result alias for the RTDB backend.
pub type RtdbResult<T> = Result<T, RtdbError>;

/// Errors specific to the real-time database transport.
#[derive(Debug, Error)]
pub enum RtdbError {
    /// The HTTP client could not be constructed.
    #[error("failed to build http client")]
    ClientBuilder {
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or its body could not be read.
    #[error("request to `{path}` failed")]
    Request {
        /// Document path the request addressed.
        path: String,
        /// Underlying reqwest failure.
        #[source]
        source: reqwest::Error,
    },
    /// The database answered with a non-success status.
    #[error("database rejected `{path}` with status {status}")]
    Status {
        /// Document path the request addressed.
        path: String,
        /// HTTP status returned by the database.
        status: StatusCode,
    },
    /// The response body was not the JSON we expected.
    #[error("failed to decode response for `{path}`")]
    Decode {
        /// Document path the request addressed.
        path: String,
        /// Underlying decode failure.
        #[source]
        source: reqwest::Error,
    },
}

impl From<RtdbError> for StorageError {
    fn from(err: RtdbError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
