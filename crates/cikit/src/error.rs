//! Error types for configuration-item processing.
//!
//! Errors are categorized so the boundary wrapper can decide whether a
//! transport call is worth retrying and the CLI can report failures per CI
//! without aborting a whole run.

use crate::kind::Kind;
use thiserror::Error;

/// Categories of errors for retry logic and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed declarative text or live readback
    Parse,
    /// Target and current disagree on an immutable field
    Conflict,
    /// The platform could not be reached (transient, retryable)
    Connection,
    /// The platform rejected a command batch
    Transport,
    /// Internal self-check failed (programming defect)
    Defect,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Parse => "Invalid declarative text",
            Self::Conflict => "Immutable field conflict",
            Self::Connection => "Platform unreachable",
            Self::Transport => "Platform rejected commands",
            Self::Defect => "Internal consistency check failed",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Parse => "Fix the file at the reported offset",
            Self::Conflict => "Delete and recreate the object, or revert the field in the file",
            Self::Connection => "Check that the platform is running and try again",
            Self::Transport => "Inspect the attempted batch and the platform message",
            Self::Defect => "Report this as a bug together with the file",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while parsing, diffing or applying a CI.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed declarative text
    #[error("parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset into the parsed text
        offset: usize,
        /// Description of the syntax error
        message: String,
    },

    /// Target and current disagree on a field that cannot change after creation
    #[error("immutable field '{field}' differs: target '{target}', current '{current}'")]
    Conflict {
        /// Model name of the field
        field: &'static str,
        /// Value wanted by the file
        target: String,
        /// Value present on the live system
        current: String,
    },

    /// The platform could not be reached at all
    #[error("connection error: {message}")]
    Connection {
        /// Message from the transport
        message: String,
    },

    /// The platform rejected or failed a command batch
    #[error("transport error: {message}")]
    Transport {
        /// Message returned by the collaborator, verbatim
        message: String,
        /// The batch that was attempted
        batch: String,
    },

    /// serialize(parse(x)) did not reproduce the canonical text
    #[error("round-trip violation for {kind} '{name}'")]
    RoundTripViolation {
        /// Kind of the offending CI
        kind: Kind,
        /// Name of the offending CI
        name: String,
        /// Canonical text written first
        expected: String,
        /// Text written after re-parsing
        actual: String,
    },

    /// Context wrapper naming the CI being processed
    #[error("{kind} '{name}': {source}")]
    Ci {
        /// Kind of the CI
        kind: Kind,
        /// Name of the CI
        name: String,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a parse error.
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Wrap this error with the CI it was raised for.
    ///
    /// Already-wrapped errors are returned unchanged so context is only
    /// added once.
    pub fn in_ci(self, kind: Kind, name: &str) -> Self {
        match self {
            Error::Ci { .. } => self,
            other => Error::Ci {
                kind,
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Parse { .. } => ErrorCategory::Parse,
            Error::Conflict { .. } => ErrorCategory::Conflict,
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::Transport { .. } => ErrorCategory::Transport,
            Error::RoundTripViolation { .. } => ErrorCategory::Defect,
            Error::Ci { source, .. } => source.category(),
            Error::Io(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Classify a failed platform call from its error output.
    ///
    /// Connection problems become [`Error::Connection`]; everything else is
    /// a [`Error::Transport`] carrying the message and batch verbatim.
    pub fn from_transport_output(stderr: &str, batch: &str) -> Self {
        let lower = stderr.to_lowercase();

        if lower.contains("connection refused")
            || lower.contains("connection reset")
            || lower.contains("could not connect")
            || lower.contains("timed out")
            || lower.contains("no route to host")
        {
            return Error::Connection {
                message: stderr.trim().to_string(),
            };
        }

        Error::Transport {
            message: stderr.to_string(),
            batch: batch.to_string(),
        }
    }
}

/// Result type for CI operations.
pub type Result<T> = std::result::Result<T, Error>;
