//! Crate-scoped error handling for redb-partition-router.
//!
//! Store and connection layers keep their own precise error types. They are
//! folded into [`Error`] at the boundary of the router operation that called
//! them, which is the only place a store failure gets wrapped.

use crate::connection::ConnectionError;
use crate::key::PartitionNumber;
use crate::store::StoreError;
use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type exposed to users of the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// An argument was rejected before any I/O took place.
    #[error("invalid argument `{parameter}`: {reason}")]
    Validation {
        parameter: &'static str,
        reason: String,
    },

    /// Resolving or mutating a partition assignment failed in the partition map store.
    #[error("partition operation `{operation}` failed")]
    Partition {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    /// The partition map could not be loaded while constructing a router.
    #[error("failed to load the partition map")]
    Load {
        #[source]
        source: StoreError,
    },

    /// A partition number outside the loaded table was requested.
    #[error("partition {0} is not present in the loaded partition map")]
    PartitionNotFound(PartitionNumber),

    /// No connection factory is registered for the descriptor's provider.
    #[error("no connection provider registered under `{0}`")]
    UnknownProvider(String),

    /// The key provider has no key for the current call context.
    #[error("no partition key is in scope for the current context")]
    NoPartitionKey,

    /// Opening or using a physical connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl Error {
    pub(crate) fn validation(parameter: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            parameter,
            reason: reason.into(),
        }
    }

    pub(crate) fn partition(operation: &'static str, source: StoreError) -> Self {
        Error::Partition { operation, source }
    }

    /// Returns the offending parameter name for validation errors.
    pub fn parameter(&self) -> Option<&'static str> {
        match self {
            Error::Validation { parameter, .. } => Some(parameter),
            _ => None,
        }
    }
}

/// Errors from decoding persisted keys and partition records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid record encoding: {0}")]
    InvalidRecordEncoding(String),

    #[error("unsupported encoding version {0}")]
    UnsupportedVersion(u8),
}
