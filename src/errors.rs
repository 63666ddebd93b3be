//! Unified error types for the audit system.
//!
//! Every fallible operation in `core`, `config` and `api` returns [`Result`].
//! The variants mirror how a failure is reported to the caller: validation and
//! lookup errors carry a human-readable message and never mutate state,
//! database errors abort the surrounding transaction, and photo-store errors
//! are normally downgraded by the recorder before they reach this far.

use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing input; nothing was changed
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The pairing token does not exist or has already been consumed
    #[error("Audit session {token_id} is invalid or has already been used")]
    InvalidOrAlreadyUsed {
        /// ID of the rejected token
        token_id: i64,
    },

    /// A referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. `"audit"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Catalog import data is malformed
    #[error("Import error: {message}")]
    Import {
        /// Description of the malformed input
        message: String,
    },

    /// A privileged operation was attempted without the right passphrase
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Why access was refused
        message: String,
    },

    /// Photo storage or conversion failed
    #[error("External service error: {message}")]
    ExternalService {
        /// Failure reported by the collaborator
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration problem
        message: String,
    },

    /// Storage-layer failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failure outside the photo store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or unreadable environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Numeric conversion overflow
    #[error("Integer conversion error: {0}")]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`].
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
