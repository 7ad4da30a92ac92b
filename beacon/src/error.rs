//! Error types surfaced by the logging pipeline.

use thiserror::Error;

/// Result of handing one record to an exporter.
pub type ExportResult = Result<(), ExportError>;

/// The most recent failure recorded by a [`Logger`], readable through
/// [`Logger::last_error`].
///
/// Emitting never returns errors to the caller; anything that goes wrong
/// while an event is processed lands here instead.
///
/// [`Logger`]: crate::Logger
/// [`Logger::last_error`]: crate::Logger::last_error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// An event was explicitly flagged for operator attention.
    #[error("Actionable event: {0}")]
    Actionable(String),

    /// An exporter failed to deliver an event.
    #[error("export of `{event}` failed: {reason}")]
    Export {
        /// Name of the event that failed to export.
        event: String,
        /// Description of the exporter failure.
        reason: String,
    },
}

/// Errors produced at the exporter boundary.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExportError {
    /// The exporter was already shut down.
    #[error("exporter already shut down")]
    AlreadyShutdown,

    /// The record could not be serialized to the wire format.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Other types of failures not covered by the variants above.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ExportError {
    /// Wrap an arbitrary error as an exporter failure.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ExportError::Other(Box::new(err))
    }
}
