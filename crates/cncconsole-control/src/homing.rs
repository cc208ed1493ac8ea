//! Homing and work offsets
//!
//! Home/unhome requests, single-axis homing, and zeroing an axis in the
//! active coordinate system. The coordinator also watches the all-homed
//! flag and runs the follow-up sequence when it changes.
//!
//! The MDI helpers live here too: clearing G92 offsets, driving back to
//! machine or work zero, and starting the touch plate or laser touch-off
//! subroutines. Return-to-zero and touch-off only run from MDI mode.

use crate::event::{Accepted, TouchOffKind, ZeroMove};
use crate::machine::{CommandLink, MachineController};
use crate::mode::MachineState;
use crate::toolchange::ToolChangeSequencer;
use cncconsole_core::{
    axis_index, axis_letter, ControllerError, InterpState, MachineStatus, Rejection, TaskMode,
    TransitionError,
};
use cncconsole_settings::Preferences;

/// Change of the all-homed flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingEdge {
    /// Every axis is referenced
    AllHomed,
    /// At least one axis lost its reference
    NotAllHomed,
}

/// Tracks the homed flag and issues homing commands
#[derive(Debug, Clone, Default)]
pub struct HomingCoordinator {
    all_homed: Option<bool>,
    no_force_homing: bool,
}

impl HomingCoordinator {
    /// `no_force_homing` lets the machine move in world mode unhomed
    pub fn new(no_force_homing: bool) -> Self {
        Self {
            all_homed: None,
            no_force_homing,
        }
    }

    /// Last observed all-homed flag
    pub fn all_homed(&self) -> bool {
        self.all_homed.unwrap_or(false)
    }

    pub fn no_force_homing(&self) -> bool {
        self.no_force_homing
    }

    /// Home every axis, or unhome them all if they are already homed
    pub fn home_all(
        &self,
        state: MachineState,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        Self::require_manual(state, commands_allowed)?;
        Self::send_home(status.all_homed(), None, link)?;
        Ok(Accepted::Sent)
    }

    /// Home a single axis; needs identity kinematics
    pub fn home_axis(
        &self,
        index: usize,
        state: MachineState,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        Self::require_manual(state, commands_allowed)?;
        if !status.kinematics.is_identity() {
            return Err(Rejection::WrongKinematics.into());
        }
        let homed = status.axis_homed(index).ok_or(Rejection::UnknownAxis)?;
        if homed {
            let axis = axis_letter(index).ok_or(Rejection::UnknownAxis)?;
            return Err(Rejection::AxisAlreadyHomed {
                axis: axis.to_ascii_uppercase(),
            }
            .into());
        }
        Self::send_home(false, Some(index), link)?;
        Ok(Accepted::Sent)
    }

    /// Set the current position of `axis` to 0 in the active system
    pub fn zero_axis(
        &self,
        axis: char,
        state: MachineState,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        self.set_axis_offset(axis, 0.0, state, status, commands_allowed, link)
    }

    /// Set the current position of `axis` to `value` with `G10 L20 P0`
    pub fn set_axis_offset(
        &self,
        axis: char,
        value: f64,
        state: MachineState,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if !commands_allowed {
            return Err(Rejection::EstopActive.into());
        }
        if !state.is_on() {
            return Err(Rejection::NotOn.into());
        }
        if !status.all_homed() {
            return Err(Rejection::NotAllHomed.into());
        }
        if status.interp_state != InterpState::Idle {
            return Err(Rejection::InterpreterBusy.into());
        }
        match axis_index(axis) {
            Some(index) if index < status.axes.len() => {}
            _ => return Err(Rejection::UnknownAxis.into()),
        }

        let line = format!("G10 L20 P0 {}{}", axis.to_ascii_uppercase(), value);
        tracing::info!("Touch off: {}", line);
        link.set_mode_and_wait(TaskMode::Mdi)?;
        link.mdi_and_wait(&line)?;
        link.set_mode_and_wait(TaskMode::Mdi)?;
        Ok(Accepted::Sent)
    }

    /// Clear the G92 offsets, then drop back to manual mode
    pub fn reset_g92(
        &self,
        state: MachineState,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if !commands_allowed {
            return Err(Rejection::EstopActive.into());
        }
        if !state.is_on() {
            return Err(Rejection::NotOn.into());
        }
        if status.interp_state != InterpState::Idle {
            return Err(Rejection::InterpreterBusy.into());
        }
        tracing::info!("Clearing G92 offsets");
        link.set_mode_and_wait(TaskMode::Mdi)?;
        link.mdi_and_wait("G92.1")?;
        link.set_mode_and_wait(TaskMode::Manual)?;
        Ok(Accepted::Sent)
    }

    /// Rapid back to zero, lifting Z to machine zero first
    pub fn go_to_zero(
        &self,
        kind: ZeroMove,
        state: MachineState,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        Self::require_mode(state, commands_allowed, TaskMode::Mdi)?;
        let moves: &[&str] = match kind {
            ZeroMove::Absolute => &["G90 G53 G0 Z0", "G53 G0 X0 Y0"],
            ZeroMove::Relative => &["G90 G53 G0 Z0", "G0 X0 Y0", "G0 Z0"],
        };
        tracing::info!("Returning to {:?} zero", kind);
        link.set_mode_and_wait(TaskMode::Mdi)?;
        for line in moves {
            link.mdi_and_wait(line)?;
        }
        Ok(Accepted::Sent)
    }

    /// Start a touch-off subroutine without waiting for it.
    ///
    /// The touch plate routine measures the mounted tool, so it needs one.
    pub fn touch_off(
        &self,
        kind: TouchOffKind,
        state: MachineState,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        Self::require_mode(state, commands_allowed, TaskMode::Mdi)?;
        let line = match kind {
            TouchOffKind::TouchPlate if status.tool_in_spindle == 0 => {
                return Err(Rejection::NoToolLoaded.into())
            }
            TouchOffKind::TouchPlate => "o< touch_plate > call",
            TouchOffKind::Laser => "o< laserzero > call",
        };
        tracing::info!("Touch off: {}", line);
        link.execute_mdi(line)?;
        Ok(Accepted::Sent)
    }

    /// Feed a status snapshot; returns the edge of the all-homed flag.
    ///
    /// The first observation always reports an edge so the follow-up
    /// state starts consistent with the machine.
    pub fn observe(&mut self, status: &MachineStatus) -> Option<HomingEdge> {
        let now = status.all_homed();
        if self.all_homed.replace(now) == Some(now) {
            return None;
        }
        Some(if now {
            HomingEdge::AllHomed
        } else {
            HomingEdge::NotAllHomed
        })
    }

    /// Commands that follow a homing edge.
    ///
    /// After homing: manual mode, world (teleop) motion, and with the
    /// reload preference set and no tool mounted, re-mount the remembered
    /// tool. After losing the reference: back to joint motion unless
    /// unhomed world moves are allowed.
    pub fn react(
        &self,
        edge: HomingEdge,
        status: &MachineStatus,
        prefs: &Preferences,
        tools: &mut ToolChangeSequencer,
        link: &mut CommandLink<'_>,
    ) -> Result<(), ControllerError> {
        match edge {
            HomingEdge::AllHomed => {
                link.set_mode_and_wait(TaskMode::Manual)?;
                link.set_motion_mode_and_wait(true)?;
                if prefs.reload_tool && status.tool_in_spindle == 0 {
                    tools.begin_reload(prefs.tool_in_spindle, link)?;
                    link.set_mode_and_wait(TaskMode::Manual)?;
                }
            }
            HomingEdge::NotAllHomed => {
                if !self.no_force_homing {
                    link.set_motion_mode_and_wait(false)?;
                }
            }
        }
        Ok(())
    }

    fn require_manual(state: MachineState, commands_allowed: bool) -> Result<(), Rejection> {
        Self::require_mode(state, commands_allowed, TaskMode::Manual)
    }

    fn require_mode(
        state: MachineState,
        commands_allowed: bool,
        required: TaskMode,
    ) -> Result<(), Rejection> {
        if !commands_allowed {
            return Err(Rejection::EstopActive);
        }
        match state {
            MachineState::On(mode) if mode == required => Ok(()),
            MachineState::On(_) => Err(Rejection::WrongMode { required }),
            _ => Err(Rejection::NotOn),
        }
    }

    // Homing runs in joint mode.
    fn send_home(
        unhome: bool,
        joint: Option<usize>,
        link: &mut CommandLink<'_>,
    ) -> Result<(), ControllerError> {
        link.set_motion_mode_and_wait(false)?;
        if unhome {
            tracing::info!("Unhoming {:?}", joint);
            link.unhome(joint)
        } else {
            tracing::info!("Homing {:?}", joint);
            link.home(joint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineCommand;
    use crate::sim::SimulatedMachine;
    use cncconsole_core::{EventBus, KinematicsType};

    fn manual() -> MachineState {
        MachineState::On(TaskMode::Manual)
    }

    fn on_machine() -> SimulatedMachine {
        let mut sim = SimulatedMachine::new(3);
        sim.power_on();
        sim
    }

    #[test]
    fn test_home_all_then_unhome() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let homing = HomingCoordinator::new(false);

        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.home_all(manual(), &status, true, &mut link),
            Ok(Accepted::Sent)
        );
        drop(link);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::SetMotionMode { teleop: false },
                MachineCommand::Home(None)
            ]
        );
        assert!(sim.status().all_homed());

        sim.clear_commands();
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        homing.home_all(manual(), &status, true, &mut link).unwrap();
        drop(link);
        assert_eq!(sim.commands().last(), Some(&MachineCommand::Unhome(None)));
        assert!(!sim.status().all_homed());
    }

    #[test]
    fn test_home_all_gating() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let homing = HomingCoordinator::new(false);
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);

        assert_eq!(
            homing.home_all(manual(), &status, false, &mut link),
            Err(Rejection::EstopActive.into())
        );
        assert_eq!(
            homing.home_all(MachineState::Off, &status, true, &mut link),
            Err(Rejection::NotOn.into())
        );
        assert_eq!(
            homing.home_all(MachineState::On(TaskMode::Mdi), &status, true, &mut link),
            Err(Rejection::WrongMode {
                required: TaskMode::Manual
            }
            .into())
        );
        drop(link);
        assert!(sim.commands().is_empty());
    }

    #[test]
    fn test_home_axis_checks() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        sim.status_mut().axes[1].homed = true;
        let homing = HomingCoordinator::new(false);
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);

        assert_eq!(
            homing.home_axis(1, manual(), &status, true, &mut link),
            Err(Rejection::AxisAlreadyHomed { axis: 'Y' }.into())
        );
        assert_eq!(
            homing.home_axis(5, manual(), &status, true, &mut link),
            Err(Rejection::UnknownAxis.into())
        );
        assert_eq!(
            homing.home_axis(0, manual(), &status, true, &mut link),
            Ok(Accepted::Sent)
        );

        let mut trivkins = status.clone();
        trivkins.kinematics = KinematicsType::Both;
        assert_eq!(
            homing.home_axis(2, manual(), &trivkins, true, &mut link),
            Err(Rejection::WrongKinematics.into())
        );
        drop(link);
        assert_eq!(sim.commands().last(), Some(&MachineCommand::Home(Some(0))));
    }

    #[test]
    fn test_zero_axis_sequence() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        sim.home_all_axes();
        let homing = HomingCoordinator::new(false);
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.zero_axis('z', manual(), &status, true, &mut link),
            Ok(Accepted::Sent)
        );
        drop(link);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::SetMode(TaskMode::Mdi),
                MachineCommand::Mdi("G10 L20 P0 Z0".to_string()),
                MachineCommand::SetMode(TaskMode::Mdi),
            ]
        );
    }

    #[test]
    fn test_axis_offset_needs_homed_idle_machine() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let homing = HomingCoordinator::new(false);

        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.set_axis_offset('x', 1.5, manual(), &status, true, &mut link),
            Err(Rejection::NotAllHomed.into())
        );
        drop(link);

        sim.home_all_axes();
        sim.status_mut().interp_state = InterpState::Reading;
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.set_axis_offset('x', 1.5, manual(), &status, true, &mut link),
            Err(Rejection::InterpreterBusy.into())
        );
        drop(link);

        sim.status_mut().interp_state = InterpState::Idle;
        let idle = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.set_axis_offset('b', 1.5, manual(), &idle, true, &mut link),
            Err(Rejection::UnknownAxis.into())
        );
        assert_eq!(
            homing.set_axis_offset('x', 1.5, manual(), &idle, true, &mut link),
            Ok(Accepted::Sent)
        );
        drop(link);
        assert_eq!(
            sim.commands().last(),
            Some(&MachineCommand::SetMode(TaskMode::Mdi))
        );
    }

    fn mdi() -> MachineState {
        MachineState::On(TaskMode::Mdi)
    }

    #[test]
    fn test_reset_g92_returns_to_manual() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let homing = HomingCoordinator::new(false);
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.reset_g92(manual(), &status, true, &mut link),
            Ok(Accepted::Sent)
        );
        drop(link);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::SetMode(TaskMode::Mdi),
                MachineCommand::Mdi("G92.1".to_string()),
                MachineCommand::SetMode(TaskMode::Manual),
            ]
        );
        assert_eq!(sim.status().task_mode, TaskMode::Manual);
    }

    #[test]
    fn test_go_to_zero_only_from_mdi() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let homing = HomingCoordinator::new(false);
        let mut link = CommandLink::new(&mut sim, &bus);
        let err = homing
            .go_to_zero(ZeroMove::Absolute, manual(), true, &mut link)
            .unwrap_err();
        assert_eq!(err.to_string(), "Must be in MDI mode");
        drop(link);
        assert!(sim.commands().is_empty());
    }

    #[test]
    fn test_go_to_zero_moves() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let homing = HomingCoordinator::new(false);
        let mut link = CommandLink::new(&mut sim, &bus);
        homing
            .go_to_zero(ZeroMove::Relative, mdi(), true, &mut link)
            .unwrap();
        drop(link);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::SetMode(TaskMode::Mdi),
                MachineCommand::Mdi("G90 G53 G0 Z0".to_string()),
                MachineCommand::Mdi("G0 X0 Y0".to_string()),
                MachineCommand::Mdi("G0 Z0".to_string()),
            ]
        );

        sim.clear_commands();
        let mut link = CommandLink::new(&mut sim, &bus);
        homing
            .go_to_zero(ZeroMove::Absolute, mdi(), true, &mut link)
            .unwrap();
        drop(link);
        assert_eq!(
            sim.commands().last(),
            Some(&MachineCommand::Mdi("G53 G0 X0 Y0".to_string()))
        );
    }

    #[test]
    fn test_touch_plate_needs_a_tool() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        sim.status_mut().task_mode = TaskMode::Mdi;
        let homing = HomingCoordinator::new(false);
        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert_eq!(
            homing.touch_off(TouchOffKind::TouchPlate, mdi(), &status, true, &mut link),
            Err(Rejection::NoToolLoaded.into())
        );
        assert_eq!(
            homing.touch_off(TouchOffKind::Laser, mdi(), &status, true, &mut link),
            Ok(Accepted::Sent)
        );

        let mut tooled = status.clone();
        tooled.tool_in_spindle = 3;
        assert_eq!(
            homing.touch_off(TouchOffKind::TouchPlate, mdi(), &tooled, true, &mut link),
            Ok(Accepted::Sent)
        );
        drop(link);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::Mdi("o< laserzero > call".to_string()),
                MachineCommand::Mdi("o< touch_plate > call".to_string()),
            ]
        );
    }

    #[test]
    fn test_observe_edges() {
        let mut homing = HomingCoordinator::new(false);
        let mut status = MachineStatus::new(2);
        assert_eq!(homing.observe(&status), Some(HomingEdge::NotAllHomed));
        assert_eq!(homing.observe(&status), None);
        status.axes.iter_mut().for_each(|a| a.homed = true);
        assert_eq!(homing.observe(&status), Some(HomingEdge::AllHomed));
        assert!(homing.all_homed());
        status.axes[0].homed = false;
        assert_eq!(homing.observe(&status), Some(HomingEdge::NotAllHomed));
    }

    #[test]
    fn test_all_homed_reloads_remembered_tool() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        sim.home_all_axes();
        let homing = HomingCoordinator::new(false);
        let mut tools = ToolChangeSequencer::new();
        let prefs = Preferences {
            reload_tool: true,
            tool_in_spindle: 4,
            ..Default::default()
        };

        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        homing
            .react(HomingEdge::AllHomed, &status, &prefs, &mut tools, &mut link)
            .unwrap();
        drop(link);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::SetMode(TaskMode::Manual),
                MachineCommand::SetMotionMode { teleop: true },
                MachineCommand::SetMode(TaskMode::Mdi),
                MachineCommand::Mdi("M61 Q4 G43".to_string()),
                MachineCommand::SetMode(TaskMode::Manual),
            ]
        );
        assert!(tools.reload_in_flight());
        assert_eq!(sim.status().tool_in_spindle, 4);
    }

    #[test]
    fn test_lost_homing_returns_to_joint_mode() {
        let bus = EventBus::new();
        let mut sim = on_machine();
        let mut tools = ToolChangeSequencer::new();
        let status = sim.status().clone();
        let prefs = Preferences::default();

        let mut link = CommandLink::new(&mut sim, &bus);
        HomingCoordinator::new(true)
            .react(HomingEdge::NotAllHomed, &status, &prefs, &mut tools, &mut link)
            .unwrap();
        HomingCoordinator::new(false)
            .react(HomingEdge::NotAllHomed, &status, &prefs, &mut tools, &mut link)
            .unwrap();
        drop(link);
        assert_eq!(
            sim.commands(),
            &[MachineCommand::SetMotionMode { teleop: false }]
        );
    }
}
