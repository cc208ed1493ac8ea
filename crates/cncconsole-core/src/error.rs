//! Error handling for the CNC console
//!
//! The console distinguishes four kinds of failure:
//! - Rejected actions: the operator asked for something that is illegal in
//!   the current machine state. Informational, nothing changes.
//! - Machine rejections: a requested transition was sent but the next
//!   status poll shows the machine did not take it. Rolled back, alerted.
//! - Controller errors: the command/status channel itself failed. A failed
//!   status poll is fatal.
//! - Computation guards: arithmetic that would divide by zero or use an
//!   unreported value. These never surface as errors; the caller simply
//!   issues no command.
//!
//! All error types use `thiserror` for ergonomic error handling.

use crate::data::TaskMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Severity of an operator-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Operator guidance
    Info,
    /// Alert
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// An operator action that is not legal in the current state.
///
/// The console state is left untouched when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Machine must be powered on
    #[error("Machine is not in ON state")]
    NotOn,

    /// Operation requires a specific task mode
    #[error("Must be in {required} mode")]
    WrongMode {
        /// The mode the operation needs.
        required: TaskMode,
    },

    /// Emergency stop is engaged or has not yet been reset
    #[error("Emergency stop is active")]
    EstopActive,

    /// Mode radios are locked while the setup page is shown
    #[error("Mode cannot be changed from the setup page")]
    SetupPageActive,

    /// Jogging needs an enabled machine in manual mode
    #[error("Jogging is only possible on an enabled machine in MANUAL mode")]
    JogInhibited,

    /// Single-axis homing needs identity kinematics
    #[error("Wrong kinematics type")]
    WrongKinematics,

    /// The axis is already referenced
    #[error("Axis {axis} is already homed")]
    AxisAlreadyHomed {
        /// Axis letter.
        axis: char,
    },

    /// Axis or joint index outside the configured set
    #[error("Unknown axis selected")]
    UnknownAxis,

    /// Operation needs every axis homed
    #[error("Must be all homed to perform this operation")]
    NotAllHomed,

    /// Operation needs an idle interpreter
    #[error("Interpreter is not IDLE")]
    InterpreterBusy,

    /// A running program owns the spindle
    #[error("The spindle is under program control")]
    SpindleUnderProgramControl,

    /// Keyboard jogging is switched off in the preferences
    #[error("Keyboard shortcuts are disabled")]
    KeyboardShortcutsDisabled,

    /// Ignore-limits was requested without a tripped limit switch
    #[error("No limit switch is active, ignore limits will not be set.")]
    NoLimitActive,

    /// Run-from-line is switched off in the preferences
    #[error("Run from line is disabled")]
    RunFromLineDisabled,

    /// Touch-off needs a mounted tool
    #[error("No tool is mounted")]
    NoToolLoaded,

    /// Jog increment index outside the configured list
    #[error("Unknown jog increment {index}")]
    UnknownIncrement {
        /// Requested index, 0 is continuous.
        index: usize,
    },
}

impl Rejection {
    /// Rejections the operator is not told about.
    ///
    /// A jog key held while the machine is off would otherwise flood the
    /// notification area.
    pub fn is_silent(&self) -> bool {
        matches!(self, Rejection::JogInhibited)
    }
}

/// A requested transition that the machine did not perform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MachineRejection {
    /// Estop reset requested but an external estop circuit is still open
    #[error("External ESTOP is set, could not change state!")]
    ExternalEstop,

    /// Power on requested but the machine stayed off
    #[error("Could not switch the machine on, is limit switch activated?")]
    PowerOnFailed,

    /// The machine reported a different mode than requested
    #[error("Requested {requested} mode but machine reports {actual}")]
    ModeNotReached {
        /// The requested task mode.
        requested: TaskMode,
        /// The mode the machine reported.
        actual: TaskMode,
    },

    /// The controller bounced a mode that is not currently available
    #[error("It is not possible to change to {mode} Mode at the moment")]
    ModeUnavailable {
        /// The mode that was refused.
        mode: TaskMode,
    },
}

impl MachineRejection {
    /// Severity of the notice this rejection produces.
    ///
    /// A bounced mode is operator guidance; everything else is an alert.
    pub fn severity(&self) -> Severity {
        match self {
            MachineRejection::ModeUnavailable { .. } => Severity::Info,
            _ => Severity::Error,
        }
    }
}

/// Errors raised by the machine command/status channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// The status feed could not be read
    #[error("Cannot poll machine status any more: {reason}")]
    PollFailed {
        /// Why the poll failed.
        reason: String,
    },

    /// A command could not be delivered
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed {
        /// The command name.
        command: String,
        /// Why it failed.
        reason: String,
    },

}

/// Error of a requested transition: either refused up front or rolled back.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    /// Refused before anything was sent
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Sent, but the machine did not follow
    #[error(transparent)]
    Machine(#[from] MachineRejection),

    /// The command channel failed
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

impl TransitionError {
    /// Severity of the notice this error produces
    pub fn severity(&self) -> Severity {
        match self {
            TransitionError::Rejected(_) => Severity::Info,
            TransitionError::Machine(m) => m.severity(),
            TransitionError::Controller(_) => Severity::Error,
        }
    }

    /// Whether the operator should see a notice at all
    pub fn is_silent(&self) -> bool {
        matches!(self, TransitionError::Rejected(r) if r.is_silent())
    }
}

/// Tool table error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolTableError {
    /// Line could not be parsed
    #[error("Invalid tool table line {line_number}: {reason}")]
    InvalidLine {
        /// 1-based line number.
        line_number: usize,
        /// Why the line was rejected.
        reason: String,
    },

    /// Tool number not present in the table
    #[error("Tool {tool_number} not found")]
    ToolNotFound {
        /// The tool number that was not found.
        tool_number: u32,
    },
}

/// Main error type for the console
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Operator action refused
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Machine did not follow a request
    #[error(transparent)]
    Machine(#[from] MachineRejection),

    /// Command/status channel error
    #[error(transparent)]
    Controller(#[from] ControllerError),

    /// Tool table error
    #[error(transparent)]
    ToolTable(#[from] ToolTableError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<TransitionError> for Error {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Rejected(r) => Error::Rejected(r),
            TransitionError::Machine(m) => Error::Machine(m),
            TransitionError::Controller(c) => Error::Controller(c),
        }
    }
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// A failed status poll leaves the console blind; the process must exit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Controller(ControllerError::PollFailed { .. }))
    }

    /// Check if this is a rejected operator action
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
