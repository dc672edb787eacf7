use std::time::Duration;

use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

use crate::bootstrap::{BootstrapReport, Step};
use crate::constants::*;

/// Bootstrap error type
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend targets database '{backend}' but plan targets '{plan}'")]
    DatabaseMismatch { backend: String, plan: String },

    #[error("Database error: {0}")]
    Driver(#[source] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] bson::de::Error),
}

impl BootstrapError {
    /// Whether this error must halt the remaining steps
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BootstrapError::AlreadyExists(_))
    }

    /// Map a server error code onto the bootstrap taxonomy
    ///
    /// Returns `None` for codes with no special meaning to the bootstrap.
    pub fn from_server_code(code: i32, message: &str) -> Option<Self> {
        match code {
            CODE_NAMESPACE_EXISTS
            | CODE_USER_ALREADY_EXISTS
            | CODE_INDEX_OPTIONS_CONFLICT
            | CODE_INDEX_KEY_SPECS_CONFLICT
            | CODE_DUPLICATE_KEY => Some(BootstrapError::AlreadyExists(message.to_string())),
            CODE_UNAUTHORIZED | CODE_AUTHENTICATION_FAILED => {
                Some(BootstrapError::PermissionDenied(message.to_string()))
            }
            CODE_HOST_UNREACHABLE
            | CODE_HOST_NOT_FOUND
            | CODE_NETWORK_TIMEOUT
            | CODE_SHUTDOWN_IN_PROGRESS
            | CODE_SOCKET_EXCEPTION => Some(BootstrapError::ConnectionFailure(message.to_string())),
            _ => None,
        }
    }
}

impl From<mongodb::error::Error> for BootstrapError {
    fn from(err: mongodb::error::Error) -> Self {
        let classified = match *err.kind {
            ErrorKind::Command(ref e) => BootstrapError::from_server_code(e.code, &e.message),
            ErrorKind::Write(WriteFailure::WriteError(ref e)) => {
                BootstrapError::from_server_code(e.code, &e.message)
            }
            ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. } => {
                Some(BootstrapError::ConnectionFailure(err.to_string()))
            }
            ErrorKind::Authentication { .. } => {
                Some(BootstrapError::PermissionDenied(err.to_string()))
            }
            _ => None,
        };

        classified.unwrap_or(BootstrapError::Driver(err))
    }
}

/// A fatal error together with the step it halted and everything done before it
#[derive(Error, Debug)]
#[error("Bootstrap halted at step '{step}': {error}")]
pub struct StepFailure {
    pub step: Step,
    #[source]
    pub error: BootstrapError,
    pub report: BootstrapReport,
}

/// Result type alias for bootstrap results
pub type Result<T> = std::result::Result<T, BootstrapError>;
