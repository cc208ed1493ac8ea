//! Operator events
//!
//! Everything the operator can do at the console arrives as one
//! [`OperatorEvent`] and is dispatched by
//! [`Console::handle`](crate::Console::handle).

use crate::machine::JogDirection;
use crate::state::Page;
use cncconsole_core::{SpindleDirection, TaskMode};
use serde::{Deserialize, Serialize};

/// Outcome of an accepted operator event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accepted {
    /// Commands were sent
    Sent,
    /// Commands were sent; the next status poll confirms them
    Pending,
    /// Nothing needed to be sent
    Unchanged,
}

/// Which override slider an event targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverrideKind {
    /// Spindle speed
    Spindle,
    /// Feed rate
    Feed,
    /// Rapid rate
    Rapid,
}

/// Operator preference toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreferenceToggle {
    /// Reload the last tool after homing
    ReloadTool,
    /// Allow starting a program from a selected line
    RunFromLine,
    /// Route keyboard jog keys to the jog controller
    KeyboardShortcuts,
}

/// Coolant outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Coolant {
    Flood,
    Mist,
}

/// How the return-to-zero move interprets zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZeroMove {
    /// Machine zero, Z first then XY
    Absolute,
    /// Work zero: Z to machine zero, XY to work zero, then Z to work zero
    Relative,
}

/// Touch-off routine run from MDI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TouchOffKind {
    /// Measure the mounted tool against a touch plate
    TouchPlate,
    /// Zero from the laser pointer
    Laser,
}

/// An operator action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatorEvent {
    /// Estop toggle; `true` engages
    Estop(bool),
    /// Power toggle
    Power(bool),
    /// Mode radio
    SelectMode(TaskMode),
    /// Notebook page switch
    SelectPage(Page),
    /// Jog button pressed
    JogPress {
        /// Axis or joint index
        index: usize,
        /// Direction
        direction: JogDirection,
    },
    /// Jog button released
    JogRelease {
        /// Axis or joint index
        index: usize,
    },
    /// Keyboard jog key
    JogKey {
        /// Axis or joint index
        index: usize,
        /// Direction
        direction: JogDirection,
        /// Key down or up
        pressed: bool,
    },
    /// Increment selection, 0 is continuous
    SelectIncrement(usize),
    /// Jog velocity slider, display units per minute
    JogVelocity(f64),
    /// Slow/fast jog toggle; `true` selects slow
    SlowJog(bool),
    /// Spindle radio
    Spindle(SpindleDirection),
    /// Coolant toggle
    Coolant {
        /// Which output
        coolant: Coolant,
        /// New state
        on: bool,
    },
    /// Override slider moved, percent
    Override {
        /// Slider
        kind: OverrideKind,
        /// New value in percent
        percent: f64,
    },
    /// Reset an override slider to 100%
    ResetOverride(OverrideKind),
    /// Home all axes, or unhome when already homed
    HomeAll,
    /// Home one axis
    HomeAxis(usize),
    /// Touch off an axis to zero in the active coordinate system
    ZeroAxis(char),
    /// Clear the G92 offsets
    ZeroG92,
    /// Move back to zero
    GoToZero(ZeroMove),
    /// Run a touch-off routine
    TouchOff(TouchOffKind),
    /// Set an axis offset in the active coordinate system
    SetAxisOffset {
        /// Axis letter
        axis: char,
        /// Offset value in machine units
        value: f64,
    },
    /// The operator confirmed the tool change prompt
    ConfirmToolChange,
    /// Toggle display units between mm and inch
    ToggleUnits,
    /// Block delete switch
    BlockDelete(bool),
    /// Optional stop switch
    OptionalStop(bool),
    /// Ignore tripped limit switches
    IgnoreLimits,
    /// Pause toggle
    Pause(bool),
    /// Run the loaded program
    Run,
    /// Pick the line to start the next run from
    RunFromLine(u32),
    /// Stop the running program
    Stop,
    /// Execute an MDI line
    Mdi(String),
    /// Preference toggle
    Preference {
        /// Which preference
        toggle: PreferenceToggle,
        /// New value
        enabled: bool,
    },
    /// Spindle start speed preference
    SpindleStartRpm(f64),
}
