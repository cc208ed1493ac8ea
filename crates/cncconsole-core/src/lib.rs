//! # CNC Console Core
//!
//! Core types for the CNC operator console: the machine status snapshot,
//! the error taxonomy, linear units, the tool table and the console event
//! bus. Everything here is plain data; the state machines that act on it
//! live in `cncconsole-control`.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod units;

pub use data::{
    axis_index, axis_letter,
    tools::{ToolEntry, ToolTable, NO_TOOL_LOADED},
    AxisStatus, InterpState, KinematicsType, MachineFault, MachineStatus, MotionMode,
    SpindleDirection, SpindleStatus, TaskMode, TaskState, AXIS_LETTERS,
};

pub use error::{
    ControllerError, Error, MachineRejection, Rejection, Result, Severity, ToolTableError,
    TransitionError,
};

pub use event_bus::{
    CommandEvent, ConsoleEvent, EventBus, EventCategory, EventFilter, MachineEvent,
    Notification,
};

pub use units::{LinearUnits, MM_PER_INCH};
