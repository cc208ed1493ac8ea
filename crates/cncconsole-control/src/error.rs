//! Errors that stop the console
//!
//! Operator-level failures are [`TransitionError`](cncconsole_core::TransitionError)
//! values returned from [`Console::handle`](crate::Console::handle) and
//! turned into notices. [`ControlError`] covers what is left: the status
//! feed going away and setup failures while building the console.

use cncconsole_core::{ControllerError, ToolTableError};
use cncconsole_settings::SettingsError;
use thiserror::Error;

/// Errors raised by the console itself
#[derive(Error, Debug)]
pub enum ControlError {
    /// The status poll failed; the sync loop cannot continue
    #[error("Status poll failed: {reason}")]
    PollFailed {
        /// Reason given by the controller.
        reason: String,
    },

    /// A command issued by the sync loop failed
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Preferences or configuration could not be used
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The tool table could not be parsed
    #[error("Tool table error: {0}")]
    ToolTable(#[from] ToolTableError),

    /// I/O error reading the tool table or program
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Whether the sync loop must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControlError::PollFailed { .. }
                | ControlError::Controller(ControllerError::PollFailed { .. })
        )
    }
}

/// Result alias for console operations
pub type ControlResult<T> = std::result::Result<T, ControlError>;
