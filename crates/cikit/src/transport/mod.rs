//! Transport abstraction for the administrative command protocol.
//!
//! The [`Transport`] trait is the only way the engine reaches the platform,
//! allowing for different implementations (an external command-line client,
//! a scripted mock for testing).

pub mod mock;
pub mod process;

use crate::error::Result;

/// Transport for command batches.
///
/// Implementations take a rendered batch and return the platform's output.
/// A failed batch must be reported as [`Error::Transport`](crate::Error::Transport)
/// carrying the platform message verbatim and the batch that was attempted,
/// or as [`Error::Connection`](crate::Error::Connection) when the platform
/// could not be reached at all.
pub trait Transport: Send + Sync {
    /// Execute a batch of commands and return the output.
    fn execute(&self, commands: &str) -> Result<String>;

    /// Short name used in log messages.
    fn name(&self) -> &str {
        "transport"
    }
}
