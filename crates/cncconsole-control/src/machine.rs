//! Machine controller interface
//!
//! The console treats the machine controller as a black box: it reads a
//! [`MachineStatus`] snapshot, drains an error channel, and sends
//! [`MachineCommand`]s. Every call is synchronous and may block until the
//! controller has taken the command.
//!
//! [`CommandLink`] wraps a controller for the duration of one operator event
//! or one tick. Every command that passes through it is logged and
//! published on the event bus, so the presentation layer (and tests) see
//! exactly what was sent.

use cncconsole_core::{
    CommandEvent, ConsoleEvent, ControllerError, EventBus, MachineFault, MachineStatus,
    SpindleDirection, TaskMode, TaskState,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Joint or Cartesian addressing of a jog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JogMode {
    /// Cartesian axis (teleop)
    Axis,
    /// Joint (free mode)
    Joint,
}

impl JogMode {
    fn flag(&self) -> u8 {
        match self {
            JogMode::Axis => 0,
            JogMode::Joint => 1,
        }
    }
}

/// Continuous jogs run until stopped, incremental jogs stop on their own
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogKind {
    /// Runs until a jog-stop
    Continuous,
    /// Moves a fixed distance in machine units
    Incremental {
        /// Distance, always positive; the direction lives in the velocity
        distance: f64,
    },
}

impl JogKind {
    /// Build from an increment distance, 0 meaning continuous
    pub fn from_distance(distance: f64) -> Self {
        if distance == 0.0 {
            JogKind::Continuous
        } else {
            JogKind::Incremental { distance }
        }
    }

    /// Distance moved, 0 for continuous
    pub fn distance(&self) -> f64 {
        match self {
            JogKind::Continuous => 0.0,
            JogKind::Incremental { distance } => *distance,
        }
    }
}

/// Direction of a jog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JogDirection {
    /// Towards positive coordinates
    Positive,
    /// Towards negative coordinates
    Negative,
}

impl JogDirection {
    /// +1.0 or -1.0
    pub fn sign(&self) -> f64 {
        match self {
            JogDirection::Positive => 1.0,
            JogDirection::Negative => -1.0,
        }
    }
}

/// A single jog command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogRequest {
    /// Axis or joint index
    pub index: usize,
    /// Direction of travel
    pub direction: JogDirection,
    /// Continuous or incremental
    pub kind: JogKind,
    /// Addressing
    pub mode: JogMode,
    /// Signed velocity in machine units per second
    pub velocity: f64,
}

/// Commands understood by the machine controller
#[derive(Debug, Clone, PartialEq)]
pub enum MachineCommand {
    /// Change task mode
    SetMode(TaskMode),
    /// Change task state
    SetState(TaskState),
    /// Start a jog
    Jog(JogRequest),
    /// Stop a continuous jog
    JogStop {
        /// Addressing used by the jog being stopped
        mode: JogMode,
        /// Axis or joint index
        index: usize,
    },
    /// Start, reverse or stop the spindle
    Spindle {
        /// Direction
        direction: SpindleDirection,
        /// Raw RPM, before the controller applies its override
        rpm: f64,
    },
    /// Spindle override factor
    SpindleOverride(f64),
    /// Flood coolant on or off
    Flood(bool),
    /// Mist coolant on or off
    Mist(bool),
    /// Feed override factor
    FeedOverride(f64),
    /// Rapid override factor
    RapidOverride(f64),
    /// Home one joint, or all when `None`
    Home(Option<usize>),
    /// Unhome one joint, or all when `None`
    Unhome(Option<usize>),
    /// Select teleop (Cartesian) or free (joint) motion
    SetMotionMode {
        /// `true` for teleop
        teleop: bool,
    },
    /// Abort whatever is running
    Abort,
    /// Execute one MDI line
    Mdi(String),
    /// Block delete switch
    BlockDelete(bool),
    /// Optional stop switch
    OptionalStop(bool),
    /// Allow motion while a limit switch is tripped
    OverrideLimits,
    /// Run the loaded program
    Run {
        /// First line to execute
        start_line: u32,
    },
    /// Pause the running program
    Pause,
    /// Resume a paused program
    Resume,
}

impl fmt::Display for MachineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineCommand::SetMode(mode) => write!(f, "set_mode({})", mode),
            MachineCommand::SetState(state) => write!(f, "set_state({})", state),
            MachineCommand::Jog(jog) => match jog.kind {
                JogKind::Continuous => write!(
                    f,
                    "jog(continuous, {}, {}, {:.4})",
                    jog.index,
                    jog.mode.flag(),
                    jog.velocity
                ),
                JogKind::Incremental { distance } => write!(
                    f,
                    "jog(increment, {}, {}, {:.4}, {})",
                    jog.index,
                    jog.mode.flag(),
                    jog.velocity,
                    distance
                ),
            },
            MachineCommand::JogStop { mode, index } => {
                write!(f, "jog(stop, {}, {})", index, mode.flag())
            }
            MachineCommand::Spindle { direction, rpm } => {
                write!(f, "spindle({}, {:.1})", direction.sign(), rpm)
            }
            MachineCommand::SpindleOverride(v) => write!(f, "spindle_override({})", v),
            MachineCommand::Flood(on) => write!(f, "flood({})", if *on { 1 } else { 0 }),
            MachineCommand::Mist(on) => write!(f, "mist({})", if *on { 1 } else { 0 }),
            MachineCommand::FeedOverride(v) => write!(f, "feed_override({})", v),
            MachineCommand::RapidOverride(v) => write!(f, "rapid_override({})", v),
            MachineCommand::Home(joint) => write!(f, "home({})", joint_arg(*joint)),
            MachineCommand::Unhome(joint) => write!(f, "unhome({})", joint_arg(*joint)),
            MachineCommand::SetMotionMode { teleop } => {
                write!(f, "set_motion_mode({})", if *teleop { 1 } else { 0 })
            }
            MachineCommand::Abort => write!(f, "abort"),
            MachineCommand::Mdi(line) => write!(f, "mdi({})", line),
            MachineCommand::BlockDelete(on) => write!(f, "set_block_delete({})", on),
            MachineCommand::OptionalStop(on) => write!(f, "set_optional_stop({})", on),
            MachineCommand::OverrideLimits => write!(f, "override_limits"),
            MachineCommand::Run { start_line } => write!(f, "run({})", start_line),
            MachineCommand::Pause => write!(f, "pause"),
            MachineCommand::Resume => write!(f, "resume"),
        }
    }
}

fn joint_arg(joint: Option<usize>) -> String {
    match joint {
        Some(j) => j.to_string(),
        None => "-1".to_string(),
    }
}

/// Command/status service of the machine controller
///
/// Implementors supply [`poll`](Self::poll), [`poll_error`](Self::poll_error),
/// [`send`](Self::send) and [`wait_complete`](Self::wait_complete); the
/// named command helpers are provided on top of `send`.
pub trait MachineController {
    /// Read a fresh status snapshot
    fn poll(&mut self) -> Result<MachineStatus, ControllerError>;

    /// Drain one fault from the error channel
    fn poll_error(&mut self) -> Option<MachineFault>;

    /// Send a command
    fn send(&mut self, command: MachineCommand) -> Result<(), ControllerError>;

    /// Block until the last command has been taken
    fn wait_complete(&mut self) -> Result<(), ControllerError>;

    /// Change task mode
    fn set_mode(&mut self, mode: TaskMode) -> Result<(), ControllerError> {
        self.send(MachineCommand::SetMode(mode))
    }

    /// Change task state
    fn set_state(&mut self, state: TaskState) -> Result<(), ControllerError> {
        self.send(MachineCommand::SetState(state))
    }

    /// Start a jog
    fn jog(&mut self, request: JogRequest) -> Result<(), ControllerError> {
        self.send(MachineCommand::Jog(request))
    }

    /// Stop a continuous jog
    fn jog_stop(&mut self, mode: JogMode, index: usize) -> Result<(), ControllerError> {
        self.send(MachineCommand::JogStop { mode, index })
    }

    /// Command the spindle
    fn spindle(&mut self, direction: SpindleDirection, rpm: f64) -> Result<(), ControllerError> {
        self.send(MachineCommand::Spindle { direction, rpm })
    }

    /// Set the spindle override factor
    fn spindle_override(&mut self, factor: f64) -> Result<(), ControllerError> {
        self.send(MachineCommand::SpindleOverride(factor))
    }

    /// Switch flood coolant
    fn flood(&mut self, on: bool) -> Result<(), ControllerError> {
        self.send(MachineCommand::Flood(on))
    }

    /// Switch mist coolant
    fn mist(&mut self, on: bool) -> Result<(), ControllerError> {
        self.send(MachineCommand::Mist(on))
    }

    /// Set the feed override factor
    fn feed_override(&mut self, factor: f64) -> Result<(), ControllerError> {
        self.send(MachineCommand::FeedOverride(factor))
    }

    /// Set the rapid override factor
    fn rapid_override(&mut self, factor: f64) -> Result<(), ControllerError> {
        self.send(MachineCommand::RapidOverride(factor))
    }

    /// Home one joint or all of them
    fn home(&mut self, joint: Option<usize>) -> Result<(), ControllerError> {
        self.send(MachineCommand::Home(joint))
    }

    /// Unhome one joint or all of them
    fn unhome(&mut self, joint: Option<usize>) -> Result<(), ControllerError> {
        self.send(MachineCommand::Unhome(joint))
    }

    /// Select teleop or free motion
    fn set_motion_mode(&mut self, teleop: bool) -> Result<(), ControllerError> {
        self.send(MachineCommand::SetMotionMode { teleop })
    }

    /// Abort
    fn abort(&mut self) -> Result<(), ControllerError> {
        self.send(MachineCommand::Abort)
    }

    /// Execute one MDI line
    fn execute_mdi(&mut self, line: &str) -> Result<(), ControllerError> {
        self.send(MachineCommand::Mdi(line.to_string()))
    }

    /// Block delete switch
    fn set_block_delete(&mut self, on: bool) -> Result<(), ControllerError> {
        self.send(MachineCommand::BlockDelete(on))
    }

    /// Optional stop switch
    fn set_optional_stop(&mut self, on: bool) -> Result<(), ControllerError> {
        self.send(MachineCommand::OptionalStop(on))
    }

    /// Override tripped limit switches
    fn override_limits(&mut self) -> Result<(), ControllerError> {
        self.send(MachineCommand::OverrideLimits)
    }

    /// Run the loaded program from `start_line`
    fn run_program(&mut self, start_line: u32) -> Result<(), ControllerError> {
        self.send(MachineCommand::Run { start_line })
    }

    /// Pause the running program
    fn pause(&mut self) -> Result<(), ControllerError> {
        self.send(MachineCommand::Pause)
    }

    /// Resume a paused program
    fn resume(&mut self) -> Result<(), ControllerError> {
        self.send(MachineCommand::Resume)
    }
}

/// Controller handle that logs and publishes every command it forwards
pub struct CommandLink<'a> {
    machine: &'a mut dyn MachineController,
    bus: &'a EventBus,
}

impl<'a> CommandLink<'a> {
    /// Wrap `machine`, publishing on `bus`
    pub fn new(machine: &'a mut dyn MachineController, bus: &'a EventBus) -> Self {
        Self { machine, bus }
    }

    /// Set mode and wait for the controller to take it
    pub fn set_mode_and_wait(&mut self, mode: TaskMode) -> Result<(), ControllerError> {
        self.set_mode(mode)?;
        self.wait_complete()
    }

    /// Select motion mode and wait
    pub fn set_motion_mode_and_wait(&mut self, teleop: bool) -> Result<(), ControllerError> {
        self.set_motion_mode(teleop)?;
        self.wait_complete()
    }

    /// Execute an MDI line and wait
    pub fn mdi_and_wait(&mut self, line: &str) -> Result<(), ControllerError> {
        self.execute_mdi(line)?;
        self.wait_complete()
    }
}

impl MachineController for CommandLink<'_> {
    fn poll(&mut self) -> Result<MachineStatus, ControllerError> {
        self.machine.poll()
    }

    fn poll_error(&mut self) -> Option<MachineFault> {
        self.machine.poll_error()
    }

    fn send(&mut self, command: MachineCommand) -> Result<(), ControllerError> {
        tracing::debug!("-> {}", command);
        self.bus
            .publish(ConsoleEvent::Command(CommandEvent::new(command.to_string())));
        self.machine.send(command).inspect_err(|e| {
            tracing::warn!("Command failed: {}", e);
        })
    }

    fn wait_complete(&mut self) -> Result<(), ControllerError> {
        self.machine.wait_complete()
    }
}
