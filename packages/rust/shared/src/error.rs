//! Error types for ServiceFunnel.
//!
//! Library crates use [`ServiceFunnelError`] via `thiserror`.
//! App crates (cli/tui) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ServiceFunnel operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceFunnelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Dataset loading error (unreadable file, missing column, no usable rows).
    #[error("dataset error: {message}")]
    Dataset { message: String },

    /// Network/HTTP error talking to the funnel server.
    #[error("network error: {0}")]
    Network(String),

    /// Question rephrasing error (transport, API, or response parsing).
    #[error("rephrase error: {0}")]
    Rephrase(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// No record carries the requested category.
    #[error("Category ID not found")]
    CategoryNotFound { category_id: String },

    /// The answer sequence is not a prefix of any record's funnel.
    #[error("Service not found for the selected answers.")]
    NoMatchingService { category_id: String },

    /// A wizard action was attempted in a state that does not accept it.
    #[error("cannot {action} while {state}")]
    InvalidTransition { action: &'static str, state: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ServiceFunnelError>;

impl ServiceFunnelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a dataset error from any displayable message.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is one of the two "nothing matched" lookups the server reports as 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CategoryNotFound { .. } | Self::NoMatchingService { .. }
        )
    }
}
