//! Error kinds surfaced by the state store: some are fatal and returned
//! to the caller, others are logged and swallowed by background
//! maintenance.

use std::io;

use thiserror::Error;

use crate::id::Version;

/// Every fallible outcome the store can produce.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An API was called while the session was in the wrong state, e.g.
    /// `update` before `prepare`, or `commit` issued twice.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The on-disk log is missing a file required to reconstruct a version,
    /// or a file in a required position could not be parsed.
    #[error("integrity error at version {version}: {message}")]
    IntegrityError { version: Version, message: String },

    /// A filesystem operation failed during commit. The target `<v>.delta`
    /// is guaranteed unchanged.
    #[error("io error during commit of version {version}: {source}")]
    Io {
        version: Version,
        #[source]
        source: io::Error,
    },

    /// The coordinator could not be reached.
    #[error("coordinator unreachable")]
    CoordinatorUnreachable,

    /// A configuration value was invalid (negative version, bad base path).
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl StoreError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }

    pub fn integrity(version: Version, message: impl Into<String>) -> Self {
        Self::IntegrityError {
            version,
            message: message.into(),
        }
    }

    pub fn io(version: Version, source: io::Error) -> Self {
        Self::Io { version, source }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
