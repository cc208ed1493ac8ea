//! Derived console state
//!
//! [`ConsoleState`] is everything the presentation layer renders: which
//! control groups are enabled, the radio selections, the displayed values.
//! It is owned by the console and rewritten on every tick and after every
//! operator event.
//!
//! The enabled flags are never set directly. [`Enablement::derive`] computes
//! all of them from the latest status and the sequencer flags, and is the
//! only writer.

use crate::mode::MachineState;
use cncconsole_core::{
    InterpState, LinearUnits, MachineStatus, SpindleDirection, TaskMode, NO_TOOL_LOADED,
};
use serde::{Deserialize, Serialize};

/// Console notebook page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Page {
    /// Program preview, the primary page
    #[default]
    Preview,
    /// Program editor
    Edit,
    /// Tool table
    Tools,
    /// Machine setup; mode radios are locked here
    Setup,
}

/// Inputs of [`Enablement::derive`]
#[derive(Debug, Clone, Copy)]
pub struct EnablementInputs<'a> {
    /// Latest status snapshot
    pub status: &'a MachineStatus,
    /// Committed machine state
    pub state: MachineState,
    /// Estop latch released
    pub commands_allowed: bool,
    /// Every axis homed
    pub all_homed: bool,
    /// Homing is not required before operation
    pub no_force_homing: bool,
    /// Tool change prompt pending or reload in flight
    pub tool_change_busy: bool,
    /// Operator pause toggle
    pub paused: bool,
}

/// Enabled/disabled flag per control group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Enablement {
    /// Power toggle
    pub power: bool,
    /// Controls usable whenever the machine is on (overrides, DRO, tool, spindle box, coolant)
    pub on_off: bool,
    /// Controls usable on an idle machine (mode radios, run, optional blocks)
    pub run_idle: bool,
    /// Controls that need homed axes (zero and offset buttons)
    pub all_homed: bool,
    /// Jog buttons
    pub jog: bool,
    /// Manual mode radio
    pub mode_manual: bool,
    /// MDI mode radio
    pub mode_mdi: bool,
    /// Auto mode radio
    pub mode_auto: bool,
    /// Run button
    pub run: bool,
    /// Spindle forward radio
    pub spindle_forward: bool,
    /// Spindle reverse radio
    pub spindle_reverse: bool,
    /// Spindle stop radio
    pub spindle_stop: bool,
    /// Touch-off button
    pub touch_off: bool,
    /// Ignore-limits toggle
    pub ignore_limits: bool,
}

impl Enablement {
    /// Compute every flag from status and sequencer state
    pub fn derive(inputs: EnablementInputs<'_>) -> Self {
        let status = inputs.status;
        let estop = inputs.state == MachineState::Estop || !inputs.commands_allowed;
        let on = !estop && matches!(inputs.state, MachineState::On(_));
        let mode = status.task_mode;
        let idle = status.interp_state == InterpState::Idle;
        let homed_ok = inputs.all_homed || inputs.no_force_homing;
        let run_idle = on && idle && !inputs.tool_change_busy;

        let (spindle_forward, spindle_reverse, spindle_stop) = if !on {
            (false, false, false)
        } else if run_idle || (inputs.paused && status.interp_state == InterpState::Paused) {
            (true, true, true)
        } else if mode != TaskMode::Manual && status.interp_state.is_running() {
            match status.spindle.direction {
                SpindleDirection::Forward => (true, false, false),
                SpindleDirection::Reverse => (false, true, false),
                SpindleDirection::Stopped => (false, false, true),
            }
        } else {
            (false, false, false)
        };

        Self {
            power: !estop,
            on_off: on,
            run_idle,
            all_homed: on && homed_ok,
            jog: on && status.enabled && mode == TaskMode::Manual,
            mode_manual: run_idle,
            mode_mdi: run_idle && homed_ok,
            mode_auto: run_idle && homed_ok,
            run: run_idle && homed_ok && mode == TaskMode::Auto,
            spindle_forward,
            spindle_reverse,
            spindle_stop,
            touch_off: on && status.tool_in_spindle != 0,
            ignore_limits: !estop && !on,
        }
    }

    /// Whether the radio for `mode` is enabled
    pub fn mode_available(&self, mode: TaskMode) -> bool {
        match mode {
            TaskMode::Manual => self.mode_manual,
            TaskMode::Mdi => self.mode_mdi,
            TaskMode::Auto => self.mode_auto,
        }
    }
}

/// Radio and toggle selections shown to the operator
///
/// Operator events set these speculatively; a rejected event restores the
/// previous selection and every tick re-syncs them with the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    /// Estop toggle engaged
    pub estop: bool,
    /// Power toggle on
    pub power: bool,
    /// Selected mode radio
    pub mode: TaskMode,
    /// Selected spindle radio
    pub spindle: SpindleDirection,
    /// Flood toggle
    pub flood: bool,
    /// Mist toggle
    pub mist: bool,
}

impl Default for Selections {
    fn default() -> Self {
        Self {
            estop: true,
            power: false,
            mode: TaskMode::Manual,
            spindle: SpindleDirection::Stopped,
            flood: false,
            mist: false,
        }
    }
}

/// Mounted tool as shown on the console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool number, 0 for none
    pub number: u32,
    /// Diameter in machine units
    pub diameter: f64,
    /// Comment, or "NO TOOL LOADED"
    pub comment: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            number: 0,
            diameter: 0.0,
            comment: NO_TOOL_LOADED.to_string(),
        }
    }
}

/// Everything the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleState {
    pub enablement: Enablement,
    pub selections: Selections,
    pub page: Page,
    pub display_units: LinearUnits,
    /// Machine-to-display unit factor
    pub unit_factor: f64,
    pub all_homed: bool,
    /// Jog slider value, display units per minute
    pub jog_velocity: f64,
    /// Selected increment, 0 is continuous
    pub jog_increment: usize,
    pub slow_jog: bool,
    pub tool: ToolInfo,
    /// Spindle speed after override
    pub spindle_rpm: i64,
    pub surface_speed: String,
    pub velocity: String,
    /// Commanded feed in machine units
    pub feed: String,
    /// Commanded feed times the feed override
    pub real_feed: String,
    pub clock: String,
    /// Fraction 0..=1 of the loaded program executed
    pub progress: f64,
    pub progress_text: String,
    pub program_length: usize,
    pub program_label: String,
    pub current_line: u32,
    pub restart_line: u32,
    pub gcodes: String,
    pub mcodes: String,
    pub coordinate_system: String,
    pub paused: bool,
    /// Spindle override slider, percent
    pub spindle_override: f64,
    /// Feed override slider, percent
    pub feed_override: f64,
    /// Rapid override slider, percent
    pub rapid_override: f64,
}

impl ConsoleState {
    /// Initial state for a console displaying in `display_units`
    pub fn new(display_units: LinearUnits) -> Self {
        Self {
            enablement: Enablement::default(),
            selections: Selections::default(),
            page: Page::Preview,
            display_units,
            unit_factor: 1.0,
            all_homed: false,
            jog_velocity: 0.0,
            jog_increment: 0,
            slow_jog: false,
            tool: ToolInfo::default(),
            spindle_rpm: 0,
            surface_speed: "0.00".to_string(),
            velocity: String::new(),
            feed: String::new(),
            real_feed: String::new(),
            clock: String::new(),
            progress: 0.0,
            progress_text: String::new(),
            program_length: 0,
            program_label: NO_PROGRAM_LOADED.to_string(),
            current_line: 0,
            restart_line: 0,
            gcodes: String::new(),
            mcodes: String::new(),
            coordinate_system: "G54".to_string(),
            paused: false,
            spindle_override: 100.0,
            feed_override: 100.0,
            rapid_override: 100.0,
        }
    }
}

/// Program label when nothing is loaded
pub const NO_PROGRAM_LOADED: &str = "No program loaded";

/// Shorten a long program path for the title label
pub fn program_label(path: &str) -> String {
    if path.is_empty() {
        return NO_PROGRAM_LOADED.to_string();
    }
    let chars: Vec<char> = path.chars().collect();
    if chars.len() > 70 {
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 50..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cncconsole_core::TaskState;

    fn inputs(status: &MachineStatus, state: MachineState) -> EnablementInputs<'_> {
        EnablementInputs {
            status,
            state,
            commands_allowed: true,
            all_homed: true,
            no_force_homing: false,
            tool_change_busy: false,
            paused: false,
        }
    }

    fn on_status(mode: TaskMode) -> MachineStatus {
        let mut status = MachineStatus::new(3);
        status.task_state = TaskState::On;
        status.task_mode = mode;
        status.enabled = true;
        status
    }

    #[test]
    fn test_estop_disables_every_group() {
        let status = MachineStatus::new(3);
        let e = Enablement::derive(inputs(&status, MachineState::Estop));
        assert_eq!(e, Enablement::default());
    }

    #[test]
    fn test_estop_reset_enables_power_only() {
        let mut status = MachineStatus::new(3);
        status.task_state = TaskState::EstopReset;
        let e = Enablement::derive(inputs(&status, MachineState::EstopReset));
        assert!(e.power);
        assert!(e.ignore_limits);
        assert!(!e.on_off);
        assert!(!e.jog);
        assert!(!e.spindle_forward);
    }

    #[test]
    fn test_latched_console_stays_disabled() {
        let status = on_status(TaskMode::Manual);
        let mut i = inputs(&status, MachineState::On(TaskMode::Manual));
        i.commands_allowed = false;
        assert_eq!(Enablement::derive(i), Enablement::default());
    }

    #[test]
    fn test_idle_manual_machine() {
        let status = on_status(TaskMode::Manual);
        let e = Enablement::derive(inputs(&status, MachineState::On(TaskMode::Manual)));
        assert!(e.on_off && e.run_idle && e.jog && e.all_homed);
        assert!(e.mode_mdi && e.mode_auto);
        assert!(!e.run);
        assert!(e.spindle_forward && e.spindle_reverse && e.spindle_stop);
        assert!(!e.touch_off);
        assert!(!e.ignore_limits);
    }

    #[test]
    fn test_unhomed_machine_locks_mdi_and_auto() {
        let status = on_status(TaskMode::Manual);
        let mut i = inputs(&status, MachineState::On(TaskMode::Manual));
        i.all_homed = false;
        let e = Enablement::derive(i);
        assert!(e.mode_manual);
        assert!(!e.mode_mdi && !e.mode_auto && !e.all_homed);

        i.no_force_homing = true;
        let e = Enablement::derive(i);
        assert!(e.mode_mdi && e.mode_auto && e.all_homed);
    }

    #[test]
    fn test_running_program_owns_spindle() {
        let mut status = on_status(TaskMode::Auto);
        status.interp_state = InterpState::Reading;
        status.spindle.direction = SpindleDirection::Reverse;
        let e = Enablement::derive(inputs(&status, MachineState::On(TaskMode::Auto)));
        assert!(!e.run_idle && !e.run);
        assert!(!e.spindle_forward && e.spindle_reverse && !e.spindle_stop);
        assert!(!e.jog);
    }

    #[test]
    fn test_pause_enables_spindle_radios() {
        let mut status = on_status(TaskMode::Auto);
        status.interp_state = InterpState::Paused;
        let mut i = inputs(&status, MachineState::On(TaskMode::Auto));
        assert!(!Enablement::derive(i).spindle_forward);
        i.paused = true;
        let e = Enablement::derive(i);
        assert!(e.spindle_forward && e.spindle_reverse && e.spindle_stop);
    }

    #[test]
    fn test_pending_tool_change_blocks_run_idle() {
        let mut status = on_status(TaskMode::Auto);
        status.tool_in_spindle = 4;
        let mut i = inputs(&status, MachineState::On(TaskMode::Auto));
        i.tool_change_busy = true;
        let e = Enablement::derive(i);
        assert!(!e.run_idle && !e.run);
        assert!(e.touch_off);
        assert!(e.on_off);
    }

    #[test]
    fn test_program_label() {
        assert_eq!(program_label(""), NO_PROGRAM_LOADED);
        assert_eq!(program_label("/tmp/part.ngc"), "/tmp/part.ngc");
        let long = format!("/home/operator/{}/part.ngc", "x".repeat(80));
        let label = program_label(&long);
        assert_eq!(label.chars().count(), 63);
        assert!(label.starts_with("/home/oper..."));
        assert!(label.ends_with("x/part.ngc"));
    }
}
