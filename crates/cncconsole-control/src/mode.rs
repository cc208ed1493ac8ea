//! Machine state and mode transitions
//!
//! Power, estop and task mode are requested by the operator and confirmed
//! by the machine. [`ModeStateMachine`] sends the requests, checks the
//! confirmation, and turns each status snapshot into a list of
//! [`ModeEdge`]s for the rest of the console to react to.
//!
//! Engaging estop sets a safety latch. While it is set no component may
//! send commands; it clears only once the machine has been seen in estop
//! and then out of it again.

use crate::event::Accepted;
use crate::machine::{CommandLink, MachineController};
use crate::state::Page;
use cncconsole_core::{
    MachineRejection, MachineStatus, Rejection, TaskMode, TaskState, TransitionError,
};
use std::fmt;

/// Committed machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineState {
    /// Emergency stop engaged
    Estop,
    /// Estop reset, power off
    EstopReset,
    /// Powered off
    Off,
    /// Powered on in a task mode
    On(TaskMode),
}

impl MachineState {
    /// State described by a status snapshot
    pub fn from_status(status: &MachineStatus) -> Self {
        match status.task_state {
            TaskState::Estop => MachineState::Estop,
            TaskState::EstopReset => MachineState::EstopReset,
            TaskState::Off => MachineState::Off,
            TaskState::On => MachineState::On(status.task_mode),
        }
    }

    /// Underlying task state
    pub fn task_state(&self) -> TaskState {
        match self {
            MachineState::Estop => TaskState::Estop,
            MachineState::EstopReset => TaskState::EstopReset,
            MachineState::Off => TaskState::Off,
            MachineState::On(_) => TaskState::On,
        }
    }

    /// Task mode while powered on
    pub fn mode(&self) -> Option<TaskMode> {
        match self {
            MachineState::On(mode) => Some(*mode),
            _ => None,
        }
    }

    /// Powered on
    pub fn is_on(&self) -> bool {
        matches!(self, MachineState::On(_))
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::On(mode) => write!(f, "ON/{}", mode),
            other => write!(f, "{}", other.task_state()),
        }
    }
}

/// A change seen between two status snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEdge {
    /// Machine went into estop
    EnteredEstop,
    /// Estop was reset
    EstopReset,
    /// Machine powered off
    PoweredOff,
    /// Machine powered on
    PoweredOn,
    /// Task mode changed
    ModeChanged(TaskMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latch {
    Clear,
    Engaged { seen_estop: bool },
}

/// Console facts the state machine needs but does not own
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeContext {
    /// Page currently shown
    pub page: Page,
    /// MDI radio enabled
    pub mdi_available: bool,
    /// Auto radio enabled
    pub auto_available: bool,
    /// Tool change prompt or reload under way
    pub tool_change_active: bool,
}

impl ModeContext {
    fn accepts(&self, mode: TaskMode) -> bool {
        match mode {
            TaskMode::Manual => true,
            TaskMode::Mdi => self.mdi_available || self.tool_change_active,
            TaskMode::Auto => self.auto_available,
        }
    }
}

/// Result of feeding one snapshot to [`ModeStateMachine::observe`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    /// Edges in the order they apply
    pub edges: Vec<ModeEdge>,
    /// Transition the machine refused, if any
    pub rejection: Option<MachineRejection>,
}

/// Power, estop and mode state machine
#[derive(Debug, Clone)]
pub struct ModeStateMachine {
    state: MachineState,
    reported: Option<(MachineState, TaskMode)>,
    pending_mode: Option<TaskMode>,
    latch: Latch,
}

impl Default for ModeStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeStateMachine {
    /// Start in estop with the latch engaged until the first snapshot
    pub fn new() -> Self {
        Self {
            state: MachineState::Estop,
            reported: None,
            pending_mode: None,
            latch: Latch::Engaged { seen_estop: true },
        }
    }

    /// Committed state
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Mode requested but not yet confirmed
    pub fn pending_mode(&self) -> Option<TaskMode> {
        self.pending_mode
    }

    /// Whether components may send commands
    pub fn commands_allowed(&self) -> bool {
        self.latch == Latch::Clear && self.state != MachineState::Estop
    }

    /// Fail with `EstopActive` while the latch is engaged
    pub fn ensure_commands_allowed(&self) -> Result<(), Rejection> {
        if self.commands_allowed() {
            Ok(())
        } else {
            Err(Rejection::EstopActive)
        }
    }

    fn note_task_state(&mut self, task_state: TaskState) {
        match (task_state, self.latch) {
            (TaskState::Estop, _) => self.latch = Latch::Engaged { seen_estop: true },
            (_, Latch::Engaged { seen_estop: true }) => {
                tracing::info!("Estop latch released");
                self.latch = Latch::Clear;
            }
            _ => {}
        }
    }

    /// Engage or release the emergency stop.
    ///
    /// Engaging always goes through. Releasing polls the machine afterwards;
    /// an estop circuit that is still open re-engages estop and fails with
    /// [`MachineRejection::ExternalEstop`].
    pub fn request_estop(
        &mut self,
        engage: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if engage {
            self.latch = Latch::Engaged { seen_estop: false };
            self.pending_mode = None;
            tracing::info!("Estop engaged by operator");
            link.set_state(TaskState::Estop)?;
            match link.wait_complete().and_then(|()| link.poll()) {
                Ok(status) => {
                    self.note_task_state(status.task_state);
                    self.state = MachineState::from_status(&status);
                }
                Err(e) => tracing::warn!("Could not confirm estop: {}", e),
            }
            return Ok(Accepted::Sent);
        }

        link.set_state(TaskState::EstopReset)?;
        link.wait_complete()?;
        let status = link.poll()?;
        if status.task_state == TaskState::Estop {
            tracing::warn!("Estop reset refused by the machine");
            link.set_state(TaskState::Estop)?;
            return Err(MachineRejection::ExternalEstop.into());
        }
        if self.latch != Latch::Clear {
            tracing::info!("Estop latch released");
            self.latch = Latch::Clear;
        }
        self.state = MachineState::from_status(&status);
        Ok(Accepted::Sent)
    }

    /// Switch machine power.
    ///
    /// Power-on is confirmed by polling; a machine that stays off fails with
    /// [`MachineRejection::PowerOnFailed`]. A confirmed power-on arms
    /// manual mode.
    pub fn request_power(
        &mut self,
        on: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        self.ensure_commands_allowed()?;

        if !on {
            tracing::info!("Powering off");
            link.set_state(TaskState::Off)?;
            return Ok(Accepted::Sent);
        }

        link.set_state(TaskState::On)?;
        link.wait_complete()?;
        let status = link.poll()?;
        self.state = MachineState::from_status(&status);
        if !status.is_on() {
            tracing::warn!("Power on refused, machine reports {}", status.task_state);
            return Err(MachineRejection::PowerOnFailed.into());
        }
        link.set_mode_and_wait(TaskMode::Manual)?;
        tracing::info!("Machine on");
        Ok(Accepted::Sent)
    }

    /// Request a task mode; confirmed by the next [`observe`](Self::observe).
    ///
    /// Refused from the setup page. A mode whose radio is disabled aborts,
    /// returns to manual and fails with [`MachineRejection::ModeUnavailable`].
    pub fn request_mode(
        &mut self,
        mode: TaskMode,
        ctx: &ModeContext,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if ctx.page == Page::Setup {
            return Err(Rejection::SetupPageActive.into());
        }
        self.ensure_commands_allowed()?;
        let current = self.state.mode().ok_or(Rejection::NotOn)?;
        if current == mode && self.pending_mode.is_none() {
            return Ok(Accepted::Unchanged);
        }

        if !ctx.accepts(mode) {
            tracing::debug!("Mode {} not available, returning to manual", mode);
            link.abort()?;
            link.set_mode_and_wait(TaskMode::Manual)?;
            return Err(MachineRejection::ModeUnavailable { mode }.into());
        }

        link.set_mode_and_wait(mode)?;
        self.pending_mode = Some(mode);
        Ok(Accepted::Pending)
    }

    /// Commit a status snapshot and report what changed.
    ///
    /// The first snapshot only commits. Entering estop or powering on forces
    /// manual mode; an MDI or Auto mode the console has not enabled is
    /// aborted back to manual.
    pub fn observe(
        &mut self,
        status: &MachineStatus,
        ctx: &ModeContext,
        link: &mut CommandLink<'_>,
    ) -> Result<Observation, cncconsole_core::ControllerError> {
        let new = MachineState::from_status(status);
        let previous = self.reported.replace((new, status.task_mode));
        if previous.map(|(state, _)| state) != Some(new) {
            tracing::info!("Machine state {}", new);
        }
        self.state = new;
        self.note_task_state(status.task_state);

        let mut observation = Observation::default();
        if let Some(requested) = self.pending_mode.take() {
            if status.is_on() && status.task_mode != requested {
                tracing::warn!(
                    "Mode {} requested, machine reports {}",
                    requested,
                    status.task_mode
                );
                observation.rejection = Some(MachineRejection::ModeNotReached {
                    requested,
                    actual: status.task_mode,
                });
            }
        }

        let Some((before, before_mode)) = previous else {
            return Ok(observation);
        };

        if before.task_state() != status.task_state {
            match status.task_state {
                TaskState::Estop => {
                    observation.edges.push(ModeEdge::EnteredEstop);
                    link.set_mode_and_wait(TaskMode::Manual)?;
                }
                TaskState::EstopReset => observation.edges.push(ModeEdge::EstopReset),
                TaskState::Off => observation.edges.push(ModeEdge::PoweredOff),
                TaskState::On => {
                    observation.edges.push(ModeEdge::PoweredOn);
                    link.set_mode_and_wait(TaskMode::Manual)?;
                }
            }
        }

        if before_mode != status.task_mode {
            let mode = status.task_mode;
            observation.edges.push(ModeEdge::ModeChanged(mode));
            if status.is_on() && !ctx.accepts(mode) {
                tracing::debug!("Machine entered {} while it is not available", mode);
                link.abort()?;
                link.set_mode_and_wait(TaskMode::Manual)?;
                observation.rejection = Some(MachineRejection::ModeUnavailable { mode });
            }
        }

        Ok(observation)
    }
}
