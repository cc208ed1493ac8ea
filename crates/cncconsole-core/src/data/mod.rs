//! Data models for the machine status feed
//!
//! This module provides:
//! - Task state, task mode and interpreter state of the controller
//! - Motion mode and kinematics type (joint vs. Cartesian addressing)
//! - Per-axis homed/limit flags
//! - Spindle status and override values
//! - The complete `MachineStatus` snapshot read once per poll
//! - Tool table entries (see [`tools`])

pub mod tools;

use crate::units::LinearUnits;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Axis letters in controller index order
pub const AXIS_LETTERS: &str = "xyzabcuvw";

/// Work coordinate system labels indexed by the controller's g5x index
pub const COORDINATE_SYSTEMS: [&str; 10] = [
    "0", "G54", "G55", "G56", "G57", "G58", "G59", "G59.1", "G59.2", "G59.3",
];

/// Machine power/safety state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Emergency stop engaged
    Estop,
    /// Estop circuit closed, machine still off
    EstopReset,
    /// Powered off
    Off,
    /// Powered on
    On,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Estop => write!(f, "ESTOP"),
            TaskState::EstopReset => write!(f, "ESTOP RESET"),
            TaskState::Off => write!(f, "OFF"),
            TaskState::On => write!(f, "ON"),
        }
    }
}

/// Operating mode governing which command classes the controller accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskMode {
    /// Jogging, homing, manual spindle
    Manual,
    /// Manual data input
    Mdi,
    /// Program execution
    Auto,
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskMode::Manual => write!(f, "MANUAL"),
            TaskMode::Mdi => write!(f, "MDI"),
            TaskMode::Auto => write!(f, "AUTO"),
        }
    }
}

/// Interpreter state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterpState {
    /// Nothing executing
    Idle,
    /// Reading ahead through a program
    Reading,
    /// Program paused
    Paused,
    /// Waiting on motion or I/O
    Waiting,
}

impl InterpState {
    /// A program is actively driving the machine
    pub fn is_running(&self) -> bool {
        matches!(self, InterpState::Reading | InterpState::Waiting)
    }
}

/// Motion addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionMode {
    /// Free (joint) mode
    Free,
    /// Coordinated mode
    Coord,
    /// Teleop (Cartesian) mode
    Teleop,
}

impl MotionMode {
    /// Joint-space addressing
    pub fn is_joint(&self) -> bool {
        matches!(self, MotionMode::Free)
    }
}

/// Kinematics of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KinematicsType {
    /// Joints map one-to-one to axes
    Identity,
    /// Forward kinematics only
    ForwardOnly,
    /// Inverse kinematics only
    InverseOnly,
    /// Both directions available
    Both,
}

impl KinematicsType {
    /// Joints and axes are the same thing
    pub fn is_identity(&self) -> bool {
        matches!(self, KinematicsType::Identity)
    }
}

/// Spindle rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SpindleDirection {
    /// Counter-clockwise
    Reverse,
    /// Not rotating
    #[default]
    Stopped,
    /// Clockwise
    Forward,
}

impl SpindleDirection {
    /// Build from the controller's signed direction value
    pub fn from_sign(value: i32) -> Self {
        match value.signum() {
            1 => SpindleDirection::Forward,
            -1 => SpindleDirection::Reverse,
            _ => SpindleDirection::Stopped,
        }
    }

    /// Signed direction value as the controller expects it
    pub fn sign(&self) -> i32 {
        match self {
            SpindleDirection::Forward => 1,
            SpindleDirection::Reverse => -1,
            SpindleDirection::Stopped => 0,
        }
    }
}

impl fmt::Display for SpindleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpindleDirection::Forward => write!(f, "forward"),
            SpindleDirection::Reverse => write!(f, "reverse"),
            SpindleDirection::Stopped => write!(f, "stop"),
        }
    }
}

/// Spindle status as reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpindleStatus {
    /// Live rotation direction
    pub direction: SpindleDirection,
    /// Live speed in RPM (signed by direction on some controllers)
    pub speed: f64,
    /// Spindle override as a factor (1.0 = 100%)
    pub override_factor: f64,
    /// Speed last commanded with S, 0 if none
    pub commanded_speed: f64,
}

impl Default for SpindleStatus {
    fn default() -> Self {
        Self {
            direction: SpindleDirection::Stopped,
            speed: 0.0,
            override_factor: 1.0,
            commanded_speed: 0.0,
        }
    }
}

/// Per-axis (per-joint) flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisStatus {
    /// Reference search completed
    pub homed: bool,
    /// A limit switch is tripped
    pub limit_active: bool,
}

/// Complete status snapshot read from the controller on every poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    /// Power/safety state
    pub task_state: TaskState,
    /// Operating mode
    pub task_mode: TaskMode,
    /// Interpreter state
    pub interp_state: InterpState,
    /// Joint vs. Cartesian addressing
    pub motion_mode: MotionMode,
    /// Kinematics type
    pub kinematics: KinematicsType,
    /// Motion is enabled
    pub enabled: bool,
    /// Per-axis flags in `AXIS_LETTERS` order
    pub axes: Vec<AxisStatus>,
    /// Spindle
    pub spindle: SpindleStatus,
    /// Flood coolant running
    pub flood: bool,
    /// Mist coolant running
    pub mist: bool,
    /// Feed override factor
    pub feed_override: f64,
    /// Rapid override factor
    pub rapid_override: f64,
    /// Linear units of the active coordinate system
    pub linear_units: LinearUnits,
    /// Tool currently mounted, 0 for none
    pub tool_in_spindle: u32,
    /// Line currently executing
    pub current_line: u32,
    /// Active G-codes, e.g. `G17`, `G43`
    pub gcodes: Vec<String>,
    /// Active M-codes
    pub mcodes: Vec<String>,
    /// Current velocity in machine units per second
    pub current_velocity: f64,
    /// Commanded feed in machine units per minute
    pub commanded_feed: f64,
    /// Loaded program, if any
    pub file: Option<PathBuf>,
    /// Index into `COORDINATE_SYSTEMS`
    pub g5x_index: usize,
}

impl MachineStatus {
    /// Snapshot of a machine with `num_axes` unhomed axes, in estop
    pub fn new(num_axes: usize) -> Self {
        Self {
            axes: vec![AxisStatus::default(); num_axes],
            ..Default::default()
        }
    }

    /// Every axis has completed its reference search
    pub fn all_homed(&self) -> bool {
        !self.axes.is_empty() && self.axes.iter().all(|a| a.homed)
    }

    /// Whether the given axis is homed, `None` for an unknown index
    pub fn axis_homed(&self, index: usize) -> Option<bool> {
        self.axes.get(index).map(|a| a.homed)
    }

    /// Any limit switch is tripped
    pub fn any_limit_active(&self) -> bool {
        self.axes.iter().any(|a| a.limit_active)
    }

    /// Machine is powered on
    pub fn is_on(&self) -> bool {
        self.task_state == TaskState::On
    }

    /// Label of the active work coordinate system
    pub fn coordinate_system(&self) -> &'static str {
        COORDINATE_SYSTEMS
            .get(self.g5x_index)
            .copied()
            .unwrap_or(COORDINATE_SYSTEMS[1])
    }

    /// Whether a given G-code is active
    pub fn has_gcode(&self, code: &str) -> bool {
        self.gcodes.iter().any(|g| g.eq_ignore_ascii_case(code))
    }
}

impl Default for MachineStatus {
    fn default() -> Self {
        Self {
            task_state: TaskState::Estop,
            task_mode: TaskMode::Manual,
            interp_state: InterpState::Idle,
            motion_mode: MotionMode::Free,
            kinematics: KinematicsType::Identity,
            enabled: false,
            axes: vec![AxisStatus::default(); 3],
            spindle: SpindleStatus::default(),
            flood: false,
            mist: false,
            feed_override: 1.0,
            rapid_override: 1.0,
            linear_units: LinearUnits::Mm,
            tool_in_spindle: 0,
            current_line: 0,
            gcodes: Vec::new(),
            mcodes: Vec::new(),
            current_velocity: 0.0,
            commanded_feed: 0.0,
            file: None,
            g5x_index: 1,
        }
    }
}

/// Fault reported on the controller's error channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineFault {
    /// Fault kind as reported (e.g. "operator error", "nml error")
    pub kind: String,
    /// Human readable text
    pub message: String,
}

impl fmt::Display for MachineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Index of an axis letter in `AXIS_LETTERS`
pub fn axis_index(letter: char) -> Option<usize> {
    AXIS_LETTERS.find(letter.to_ascii_lowercase())
}

/// Axis letter for an index
pub fn axis_letter(index: usize) -> Option<char> {
    AXIS_LETTERS.chars().nth(index)
}
