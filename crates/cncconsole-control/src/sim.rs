//! Simulated machine controller
//!
//! An in-process stand-in for the real controller. Commands take effect
//! immediately on the status snapshot (homing completes at once, MDI lines
//! finish before `wait_complete` returns) and every command is recorded so
//! tests can assert on the exact sequence the console sent.
//!
//! Failure injection covers the cases the console must survive: an external
//! estop that refuses reset, a power-on refused by a tripped limit, a
//! machine that ignores mode changes, faults on the error channel, and a
//! status channel that stops answering.

use crate::machine::{MachineCommand, MachineController};
use cncconsole_core::{
    ControllerError, InterpState, MachineFault, MachineStatus, MotionMode, SpindleDirection,
    TaskMode, TaskState,
};
use std::collections::VecDeque;

/// In-process machine simulation
#[derive(Debug, Clone)]
pub struct SimulatedMachine {
    status: MachineStatus,
    commands: Vec<MachineCommand>,
    faults: VecDeque<MachineFault>,
    external_estop: bool,
    power_fault: bool,
    mode_locked: bool,
    poll_failure: Option<String>,
    waits: usize,
}

impl SimulatedMachine {
    /// A machine with `num_axes` unhomed axes, sitting in estop
    pub fn new(num_axes: usize) -> Self {
        Self::with_status(MachineStatus::new(num_axes))
    }

    /// Start from an arbitrary snapshot
    pub fn with_status(status: MachineStatus) -> Self {
        Self {
            status,
            commands: Vec::new(),
            faults: VecDeque::new(),
            external_estop: false,
            power_fault: false,
            mode_locked: false,
            poll_failure: None,
            waits: 0,
        }
    }

    /// Current snapshot
    pub fn status(&self) -> &MachineStatus {
        &self.status
    }

    /// Mutable snapshot, for driving status changes from outside
    pub fn status_mut(&mut self) -> &mut MachineStatus {
        &mut self.status
    }

    /// Every command received, oldest first
    pub fn commands(&self) -> &[MachineCommand] {
        &self.commands
    }

    /// Forget recorded commands
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of `wait_complete` calls
    pub fn wait_count(&self) -> usize {
        self.waits
    }

    /// Keep the estop circuit open: estop reset requests are ignored
    pub fn set_external_estop(&mut self, open: bool) {
        self.external_estop = open;
        if open {
            self.status.task_state = TaskState::Estop;
            self.status.enabled = false;
        }
    }

    /// Refuse power-on, as a tripped limit switch does
    pub fn set_power_fault(&mut self, fault: bool) {
        self.power_fault = fault;
    }

    /// Ignore mode change requests
    pub fn set_mode_locked(&mut self, locked: bool) {
        self.mode_locked = locked;
    }

    /// Queue a fault on the error channel
    pub fn push_fault(&mut self, kind: &str, message: &str) {
        self.faults.push_back(MachineFault {
            kind: kind.to_string(),
            message: message.to_string(),
        });
    }

    /// Make every following poll fail
    pub fn fail_polls(&mut self, reason: &str) {
        self.poll_failure = Some(reason.to_string());
    }

    /// Bring the machine to On/Manual with motion enabled
    pub fn power_on(&mut self) {
        self.status.task_state = TaskState::On;
        self.status.task_mode = TaskMode::Manual;
        self.status.enabled = true;
    }

    /// Mark every axis homed
    pub fn home_all_axes(&mut self) {
        for axis in &mut self.status.axes {
            axis.homed = true;
        }
    }

    fn apply_state(&mut self, requested: TaskState) {
        let current = self.status.task_state;
        let next = match requested {
            TaskState::Estop => Some(TaskState::Estop),
            TaskState::EstopReset if current == TaskState::Estop && !self.external_estop => {
                Some(TaskState::EstopReset)
            }
            TaskState::On
                if matches!(current, TaskState::EstopReset | TaskState::Off)
                    && !self.power_fault =>
            {
                Some(TaskState::On)
            }
            TaskState::Off if current != TaskState::Estop => Some(TaskState::Off),
            _ => None,
        };

        match next {
            Some(state) => {
                self.status.task_state = state;
                self.status.enabled = state == TaskState::On;
                if state != TaskState::On {
                    self.status.spindle.direction = SpindleDirection::Stopped;
                    self.status.spindle.speed = 0.0;
                    self.status.flood = false;
                    self.status.mist = false;
                    self.status.interp_state = InterpState::Idle;
                }
            }
            None => tracing::debug!("Simulated machine ignores set_state({})", requested),
        }
    }

    fn apply_mode(&mut self, mode: TaskMode) {
        if self.mode_locked || self.status.interp_state.is_running() {
            tracing::debug!("Simulated machine ignores set_mode({})", mode);
            return;
        }
        self.status.task_mode = mode;
    }

    fn set_homed(&mut self, joint: Option<usize>, homed: bool) -> Result<(), String> {
        if !self.status.is_on() {
            return Err("machine is not on".to_string());
        }
        match joint {
            None => self.status.axes.iter_mut().for_each(|a| a.homed = homed),
            Some(j) => match self.status.axes.get_mut(j) {
                Some(axis) => axis.homed = homed,
                None => return Err(format!("no such joint {}", j)),
            },
        }
        Ok(())
    }

    fn run_mdi(&mut self, line: &str) {
        let upper = line.to_ascii_uppercase();
        let mut words = upper.split_whitespace().peekable();
        while let Some(word) = words.next() {
            match word {
                "M61" => {
                    if let Some(q) = words.next_if(|w| w.starts_with('Q')) {
                        let value = if q.len() > 1 {
                            q[1..].parse().ok()
                        } else {
                            words.next().and_then(|n| n.parse().ok())
                        };
                        if let Some(tool) = value {
                            self.status.tool_in_spindle = tool;
                        }
                    }
                }
                "G43" if !self.status.has_gcode("G43") => {
                    self.status.gcodes.push("G43".to_string())
                }
                "G49" => self.status.gcodes.retain(|g| g != "G43"),
                _ => {}
            }
        }
    }

    fn apply(&mut self, command: &MachineCommand) -> Result<(), String> {
        match command {
            MachineCommand::SetState(state) => self.apply_state(*state),
            MachineCommand::SetMode(mode) => self.apply_mode(*mode),
            MachineCommand::Home(joint) => self.set_homed(*joint, true)?,
            MachineCommand::Unhome(joint) => self.set_homed(*joint, false)?,
            MachineCommand::SetMotionMode { teleop } => {
                self.status.motion_mode = if *teleop {
                    MotionMode::Teleop
                } else {
                    MotionMode::Free
                };
            }
            MachineCommand::Spindle { direction, rpm } => {
                self.status.spindle.direction = *direction;
                self.status.spindle.speed = match direction {
                    SpindleDirection::Stopped => 0.0,
                    _ => rpm.abs(),
                };
            }
            MachineCommand::SpindleOverride(factor) => self.status.spindle.override_factor = *factor,
            MachineCommand::Flood(on) => self.status.flood = *on,
            MachineCommand::Mist(on) => self.status.mist = *on,
            MachineCommand::FeedOverride(factor) => self.status.feed_override = *factor,
            MachineCommand::RapidOverride(factor) => self.status.rapid_override = *factor,
            MachineCommand::Abort => self.status.interp_state = InterpState::Idle,
            MachineCommand::Mdi(line) => {
                if self.status.task_mode != TaskMode::Mdi {
                    return Err("not in MDI mode".to_string());
                }
                self.run_mdi(line);
            }
            MachineCommand::Run { start_line } => {
                if self.status.task_mode == TaskMode::Auto {
                    self.status.interp_state = InterpState::Reading;
                    self.status.current_line = *start_line;
                }
            }
            MachineCommand::Pause => {
                if self.status.interp_state.is_running() {
                    self.status.interp_state = InterpState::Paused;
                }
            }
            MachineCommand::Resume => {
                if self.status.interp_state == InterpState::Paused {
                    self.status.interp_state = InterpState::Reading;
                }
            }
            MachineCommand::Jog(_)
            | MachineCommand::JogStop { .. }
            | MachineCommand::BlockDelete(_)
            | MachineCommand::OptionalStop(_)
            | MachineCommand::OverrideLimits => {}
        }
        Ok(())
    }
}

impl Default for SimulatedMachine {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MachineController for SimulatedMachine {
    fn poll(&mut self) -> Result<MachineStatus, ControllerError> {
        match &self.poll_failure {
            Some(reason) => Err(ControllerError::PollFailed {
                reason: reason.clone(),
            }),
            None => Ok(self.status.clone()),
        }
    }

    fn poll_error(&mut self) -> Option<MachineFault> {
        self.faults.pop_front()
    }

    fn send(&mut self, command: MachineCommand) -> Result<(), ControllerError> {
        let result = self.apply(&command).map_err(|reason| ControllerError::CommandFailed {
            command: command.to_string(),
            reason,
        });
        self.commands.push(command);
        result
    }

    fn wait_complete(&mut self) -> Result<(), ControllerError> {
        self.waits += 1;
        Ok(())
    }
}
