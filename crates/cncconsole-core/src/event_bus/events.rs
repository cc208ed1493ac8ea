//! Event type definitions for the console event bus.
//!
//! Events are cloneable and serializable so a presentation layer can log or
//! replay them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::{InterpState, MachineFault, TaskMode, TaskState};
use crate::error::Severity;
use crate::units::LinearUnits;

/// Root event enum for everything the console publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConsoleEvent {
    /// Operator-visible notice
    Notification(Notification),
    /// Machine status edges observed by the sync loop
    Machine(MachineEvent),
    /// Commands sent to the machine controller
    Command(CommandEvent),
}

impl ConsoleEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            ConsoleEvent::Notification(_) => EventCategory::Notification,
            ConsoleEvent::Machine(_) => EventCategory::Machine,
            ConsoleEvent::Command(_) => EventCategory::Command,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            ConsoleEvent::Notification(n) => format!("[{}] {}", n.severity, n.message),
            ConsoleEvent::Machine(e) => e.description(),
            ConsoleEvent::Command(e) => format!("-> {}", e.command),
        }
    }

    /// Shorthand for an informational notice
    pub fn info(message: impl Into<String>) -> Self {
        ConsoleEvent::Notification(Notification::new(Severity::Info, message))
    }

    /// Shorthand for an error notice
    pub fn error(message: impl Into<String>) -> Self {
        ConsoleEvent::Notification(Notification::new(Severity::Error, message))
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Operator notices.
    Notification,
    /// Machine status edges.
    Machine,
    /// Issued commands.
    Command,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Notification => write!(f, "Notification"),
            EventCategory::Machine => write!(f, "Machine"),
            EventCategory::Command => write!(f, "Command"),
        }
    }
}

/// A notice for the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Info or error
    pub severity: Severity,
    /// Text shown to the operator
    pub message: String,
    /// When the notice was raised
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create a notice stamped with the current time
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Machine status edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MachineEvent {
    /// Task state changed.
    StateChanged {
        /// Previous state, `None` on the first observation.
        from: Option<TaskState>,
        /// New state.
        to: TaskState,
    },
    /// Task mode changed.
    ModeChanged {
        /// New mode.
        mode: TaskMode,
    },
    /// Interpreter state changed.
    InterpreterChanged {
        /// New interpreter state.
        state: InterpState,
    },
    /// Every axis has been homed.
    AllHomed,
    /// At least one axis lost its reference.
    HomingLost,
    /// The mounted tool changed.
    ToolChanged {
        /// Previously mounted tool.
        from: u32,
        /// Newly mounted tool.
        to: u32,
    },
    /// A tool change prompt is waiting for confirmation.
    ToolChangeRequested {
        /// Tool to mount, 0 to remove.
        tool: u32,
        /// Prompt text.
        message: String,
    },
    /// The operator confirmed the tool change.
    ToolChangeConfirmed {
        /// Tool that was requested.
        tool: u32,
    },
    /// The active coordinate system's units changed.
    UnitsChanged {
        /// Machine linear units.
        machine: LinearUnits,
        /// Console display units.
        display: LinearUnits,
    },
    /// Active G/M-codes changed.
    CodesChanged {
        /// Space-separated active G-codes.
        gcodes: String,
        /// Space-separated active M-codes.
        mcodes: String,
    },
    /// Fault drained from the controller's error channel.
    Fault(MachineFault),
}

impl MachineEvent {
    fn description(&self) -> String {
        match self {
            MachineEvent::StateChanged { from, to } => match from {
                Some(from) => format!("State {} -> {}", from, to),
                None => format!("State {}", to),
            },
            MachineEvent::ModeChanged { mode } => format!("Mode {}", mode),
            MachineEvent::InterpreterChanged { state } => format!("Interpreter {:?}", state),
            MachineEvent::AllHomed => "All axes homed".to_string(),
            MachineEvent::HomingLost => "Homing lost".to_string(),
            MachineEvent::ToolChanged { from, to } => format!("Tool T{} -> T{}", from, to),
            MachineEvent::ToolChangeRequested { tool, .. } => {
                format!("Tool change to T{} requested", tool)
            }
            MachineEvent::ToolChangeConfirmed { tool } => {
                format!("Tool change to T{} confirmed", tool)
            }
            MachineEvent::UnitsChanged { machine, display } => {
                format!("Units machine={} display={}", machine, display)
            }
            MachineEvent::CodesChanged { gcodes, mcodes } => format!("{} {}", gcodes, mcodes),
            MachineEvent::Fault(fault) => fault.to_string(),
        }
    }
}

/// A command sent to the machine controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEvent {
    /// Rendered command, e.g. `set_mode(MDI)` or `mdi(G43)`
    pub command: String,
}

impl CommandEvent {
    /// Create a command event
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}
