//! Crate error types.

use crate::config::validation::ValidationError;
use crate::store::StoreError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by construction and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Semantic configuration problems, all of them.
    #[error("invalid configuration: {}", format_errors(.0))]
    Config(Vec<ValidationError>),

    /// Configuration file could not be read or parsed.
    #[error("config file {path}: {message}")]
    ConfigFile { path: String, message: String },

    /// Template compilation failed at construction.
    #[error("template engine: {0}")]
    Template(#[from] tera::Error),

    /// Cache store failure during construction.
    #[error("cache store: {0}")]
    Store(#[from] StoreError),

    /// Socket level failure while binding or closing.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Lifecycle misuse, e.g. `close` before `listen`.
    #[error("server is not listening")]
    NotListening,

    /// A second `listen` while a listener is already bound.
    #[error("server is already listening")]
    AlreadyListening,
}

impl Error {
    pub(crate) fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
