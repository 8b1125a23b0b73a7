//! Error types and result types for client operations.
//!
//! Every fallible operation in this crate returns [`LoveseatResult<T>`]. HTTP failures
//! carry the response status and body so callers can tell a missing document (404)
//! from a revision conflict (409) without a dedicated variant for each.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to the database server
/// or mapping documents.
#[derive(Error, Debug)]
pub enum LoveseatError {
    /// The server answered with a status outside of the 2xx/3xx range.
    #[error("HTTP error {status}: {body}")]
    Http {
        /// The HTTP status code of the response.
        status: u16,
        /// The raw response body, decoded lossily as UTF-8.
        body: String,
    },
    /// The request never produced a response (connection refused, reset, TLS failure...).
    #[error("Transport error: {0}")]
    Transport(String),
    /// A response body or feed line could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A stored value could not be converted into the native type of a property.
    #[error("Property {property} could not be converted: {source}")]
    Conversion {
        /// The name of the property being read or written.
        property: String,
        /// The underlying conversion failure.
        #[source]
        source: ConversionError,
    },
    /// The client configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No database could be chosen for a mapper type.
    #[error("No database resolved for mapper type {0}")]
    DatabaseNotResolved(String),
    /// The server answered successfully but with a body of an unexpected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LoveseatError {
    /// Returns the HTTP status code if this is an HTTP failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            LoveseatError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the server reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Returns `true` if the server rejected a write because of a stale revision.
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

/// A value stored in a document does not fit the native type of its property.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    /// A short description of the accepted JSON shape.
    pub expected: &'static str,
    /// The offending JSON value, rendered as text.
    pub found: String,
}

impl ConversionError {
    pub fn new(expected: &'static str, found: impl ToString) -> Self {
        Self {
            expected,
            found: found.to_string(),
        }
    }
}

/// A specialized `Result` type for client operations.
pub type LoveseatResult<T> = Result<T, LoveseatError>;

impl From<SerdeJsonError> for LoveseatError {
    fn from(err: SerdeJsonError) -> Self {
        LoveseatError::Serialization(err.to_string())
    }
}
