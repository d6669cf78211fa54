//! Error types for the KadeDB storage core
//!
//! Every storage operation returns [`KadeResult`]. Errors carry a
//! human-readable message and classify into a [`Status`] so callers can
//! branch on semantics without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for storage operations
pub type KadeResult<T> = Result<T, KadeError>;

/// Error type for storage operations
#[derive(Error, Debug, Clone)]
pub enum KadeError {
    /// A named entity (table, collection, series, graph, node, key) is missing
    #[error("not found: {0}")]
    NotFound(String),

    /// A create collided with an existing entity
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Schema/type/constraint/projection/bound violations and unsupported shapes
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A post-mutation check (uniqueness) rejected the change
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Unexpected internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),

    /// Codec failure while reading or writing serialized entities
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

/// Semantic classification of a [`KadeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    NotFound,
    AlreadyExists,
    InvalidArgument,
    FailedPrecondition,
    Internal,
}

impl KadeError {
    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new already-exists error
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a new invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a new failed-precondition error
    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error into a [`Status`]
    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::AlreadyExists(_) => Status::AlreadyExists,
            Self::InvalidArgument(_) => Status::InvalidArgument,
            Self::FailedPrecondition(_) => Status::FailedPrecondition,
            Self::Internal(_) => Status::Internal,
            Self::Serialization(_) => Status::InvalidArgument,
        }
    }
}

/// Codec errors for the binary and JSON formats
#[derive(Error, Debug, Clone)]
pub enum SerializationError {
    #[error("bad magic 0x{0:08X}")]
    BadMagic(u32),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown value tag {0}")]
    UnknownTag(u8),

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
