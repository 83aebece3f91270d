//! Error types for the Floom client.
//!
//! # Design
//! `RunError` enumerates every way a pipeline run can fail before a response
//! reaches the caller. The client never hands a `RunError` out of `run`; it
//! converts it into the `FloomError` carried by a failed `FloomResponse`, and
//! the conversion decides the status/title/detail for each variant.
//! `ConfigError` covers client construction only.

use thiserror::Error;

use crate::http::TransportError;
use crate::shape::ReflectError;

/// Failure during a single pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The base URL points at the hosted service but no API key is set.
    #[error("API key is required for the Floom instance at {url}")]
    MissingApiKey { url: String },

    /// The server could not be reached.
    #[error("Failed to establish a new connection. Make sure the Floom instance is running.")]
    Connection(#[source] TransportError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The transport failed for a reason other than connectivity.
    #[error(transparent)]
    Transport(TransportError),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response body is not the JSON the API documents.
    #[error("malformed response: {0}")]
    MalformedBody(String),

    /// The JsonObject payload does not fit the requested shape.
    #[error(transparent)]
    Shape(#[from] ReflectError),

    /// A saved response could not be read from disk.
    #[error("could not read saved response: {0}")]
    Io(#[from] std::io::Error),
}

impl From<TransportError> for RunError {
    fn from(err: TransportError) -> Self {
        if err.is_connect() {
            RunError::Connection(err)
        } else {
            RunError::Transport(err)
        }
    }
}

/// Failure to assemble a client configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base_url is required")]
    MissingBaseUrl,

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
