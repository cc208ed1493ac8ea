//! # CNC Console Control
//!
//! Status synchronization and command gating for the operator console.
//!
//! The [`Console`] owns one value of each component:
//!
//! - [`ModeStateMachine`] - estop, power and task mode, plus the estop latch
//! - [`JogController`] - jog velocity, increments and jog start/stop
//! - [`SpindleController`] - spindle direction and the three override sliders
//! - [`HomingCoordinator`] - homing, touch-off and the post-homing sequence
//! - [`ToolChangeSequencer`] - the manual tool change prompt and tool reload
//! - [`UnitConverter`] - rescaling of velocity controls between mm and inch
//!
//! [`Console::tick`] is the status sync loop body; [`run`] drives it on a
//! tokio interval. Commands reach the machine through the synchronous
//! [`MachineController`] trait; [`SimulatedMachine`] implements it in memory.

pub mod console;
pub mod error;
pub mod event;
pub mod homing;
pub mod jog;
pub mod machine;
pub mod mode;
pub mod sim;
pub mod spindle;
pub mod state;
pub mod toolchange;
pub mod units;

pub use console::{load_tool_table, run, Console, DEFAULT_POLL_PERIOD};
pub use error::{ControlError, ControlResult};
pub use event::{
    Accepted, Coolant, OperatorEvent, OverrideKind, PreferenceToggle, TouchOffKind, ZeroMove,
};
pub use homing::{HomingCoordinator, HomingEdge};
pub use jog::{parse_increments, Increment, JogController, JogSlider, MAX_INCREMENTS};
pub use machine::{
    CommandLink, JogDirection, JogKind, JogMode, JogRequest, MachineCommand, MachineController,
};
pub use mode::{MachineState, ModeContext, ModeEdge, ModeStateMachine, Observation};
pub use sim::SimulatedMachine;
pub use spindle::{OverrideLimits, OverrideState, SpindleController, SpindleDisplay};
pub use state::{ConsoleState, Enablement, EnablementInputs, Page, Selections, ToolInfo};
pub use toolchange::{ToolChangeRequest, ToolChangeSequencer, ToolUpdate};
pub use units::{Rescale, UnitConverter};
