//! The operator console
//!
//! [`Console`] owns the machine handle, every component and the derived
//! [`ConsoleState`]. Operator input goes through [`Console::handle`]; the
//! status feed goes through [`Console::tick`], which the async [`run`] loop
//! calls on a fixed period.
//!
//! Each tick reconciles in a fixed order: faults and active codes, then
//! mode and estop, then homing, the interpreter, tool change, spindle, units
//! and jog, and finally enablement. Commands issued from the tick that
//! fail are reported as notices and the tick carries on; only a failed
//! poll ends the loop.

use crate::error::{ControlError, ControlResult};
use crate::event::{Accepted, Coolant, OperatorEvent, OverrideKind, PreferenceToggle};
use crate::homing::{HomingCoordinator, HomingEdge};
use crate::jog::JogController;
use crate::machine::{CommandLink, JogDirection, MachineController};
use crate::mode::{MachineState, ModeContext, ModeEdge, ModeStateMachine};
use crate::spindle::SpindleController;
use crate::state::{
    program_label, ConsoleState, Enablement, EnablementInputs, Page, ToolInfo, NO_PROGRAM_LOADED,
};
use crate::toolchange::ToolChangeSequencer;
use crate::units::UnitConverter;
use cncconsole_core::units::{format_feed, format_velocity};
use cncconsole_core::{
    ControllerError, ConsoleEvent, EventBus, InterpState, MachineEvent, MachineStatus,
    Notification, Rejection, Severity, TaskMode, TaskState, ToolTable, TransitionError,
};
use cncconsole_settings::{ConsoleConfig, PreferenceStore, Preferences};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Default status poll period
pub const DEFAULT_POLL_PERIOD: Duration = Duration::from_millis(100);

fn publish(bus: &EventBus, event: ConsoleEvent) {
    bus.publish(event);
}

fn notify(bus: &EventBus, severity: Severity, message: impl Into<String>) {
    publish(bus, ConsoleEvent::Notification(Notification::new(severity, message)));
}

// Log and surface a failed command; the tick continues without its result.
fn reported<T>(bus: &EventBus, result: Result<T, ControllerError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::error!("{}", e);
            notify(bus, Severity::Error, e.to_string());
            None
        }
    }
}

/// Load the tool table named in the configuration, empty if none is set
pub fn load_tool_table(config: &ConsoleConfig) -> ControlResult<ToolTable> {
    match &config.emcio.tool_table {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            let tools = ToolTable::parse(&contents)?;
            tracing::info!("Loaded {} tools from {}", tools.len(), path.display());
            Ok(tools)
        }
        None => Ok(ToolTable::new()),
    }
}

/// The operator console
pub struct Console<M: MachineController> {
    machine: M,
    bus: Arc<EventBus>,
    config: ConsoleConfig,
    prefs: Preferences,
    store: Box<dyn PreferenceStore>,
    tools: ToolTable,
    modes: ModeStateMachine,
    jog: JogController,
    spindle: SpindleController,
    homing: HomingCoordinator,
    toolchange: ToolChangeSequencer,
    units: UnitConverter,
    state: ConsoleState,
    status: MachineStatus,
    program: Option<(PathBuf, usize)>,
    initialized: bool,
}

impl<M: MachineController> Console<M> {
    /// Build a console from configuration and stored preferences
    pub fn new(
        machine: M,
        config: ConsoleConfig,
        store: Box<dyn PreferenceStore>,
        tools: ToolTable,
        bus: Arc<EventBus>,
    ) -> ControlResult<Self> {
        config.validate()?;
        let mut prefs = store.load()?;
        prefs.constrain(&config);

        let jog = JogController::new(&config);
        let mut state = ConsoleState::new(config.display_units());
        state.jog_velocity = jog.slider().value;
        tracing::info!(
            "Console ready: {} axes, {} increments, display in {}",
            config.num_axes(),
            jog.increments().len(),
            state.display_units
        );

        Ok(Self {
            status: MachineStatus::new(config.num_axes()),
            spindle: SpindleController::new(&config),
            homing: HomingCoordinator::new(config.traj.no_force_homing),
            machine,
            bus,
            prefs,
            store,
            tools,
            modes: ModeStateMachine::new(),
            jog,
            toolchange: ToolChangeSequencer::new(),
            units: UnitConverter::new(),
            state,
            program: None,
            initialized: false,
            config,
        })
    }

    /// Derived state for the presentation layer
    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    /// Last polled status
    pub fn status(&self) -> &MachineStatus {
        &self.status
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut M {
        &mut self.machine
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    pub fn modes(&self) -> &ModeStateMachine {
        &self.modes
    }

    pub fn jog(&self) -> &JogController {
        &self.jog
    }

    pub fn spindle(&self) -> &SpindleController {
        &self.spindle
    }

    pub fn homing(&self) -> &HomingCoordinator {
        &self.homing
    }

    pub fn toolchange(&self) -> &ToolChangeSequencer {
        &self.toolchange
    }

    pub fn units(&self) -> &UnitConverter {
        &self.units
    }

    /// Whether the first status snapshot has been processed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Dispatch an operator event.
    ///
    /// A failed event restores the radio selections it touched and raises
    /// a notice, unless the failure is one the operator is not told about.
    pub fn handle(&mut self, event: OperatorEvent) -> Result<Accepted, TransitionError> {
        tracing::debug!("Operator event {:?}", event);
        let selections = self.state.selections;
        let result = self.dispatch(event);
        match &result {
            Ok(accepted) => tracing::debug!("Accepted: {:?}", accepted),
            Err(e) if e.is_silent() => tracing::debug!("Ignored: {}", e),
            Err(e) => {
                match e.severity() {
                    Severity::Info => tracing::info!("{}", e),
                    Severity::Error => tracing::warn!("{}", e),
                }
                notify(&self.bus, e.severity(), e.to_string());
            }
        }
        if result.is_err() {
            self.state.selections = selections;
        }
        self.sync_jog_state();
        self.refresh_enablement();
        result
    }

    fn dispatch(&mut self, event: OperatorEvent) -> Result<Accepted, TransitionError> {
        let allowed = self.modes.commands_allowed();
        match event {
            OperatorEvent::Estop(engage) => {
                self.state.selections.estop = engage;
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                let accepted = self.modes.request_estop(engage, &mut link)?;
                if engage {
                    self.toolchange.cancel();
                    self.jog.clear();
                    self.state.paused = false;
                }
                Ok(accepted)
            }
            OperatorEvent::Power(on) => {
                self.state.selections.power = on;
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.modes.request_power(on, &mut link)
            }
            OperatorEvent::SelectMode(mode) => {
                self.state.selections.mode = mode;
                let ctx = self.mode_context();
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.modes.request_mode(mode, &ctx, &mut link)
            }
            OperatorEvent::SelectPage(page) => {
                if self.state.page != page {
                    tracing::debug!("Page {:?}", page);
                    self.state.page = page;
                }
                Ok(Accepted::Unchanged)
            }
            OperatorEvent::JogPress { index, direction } => self.jog_press(index, direction),
            OperatorEvent::JogRelease { index } => self.jog_release(index),
            OperatorEvent::JogKey {
                index,
                direction,
                pressed,
            } => {
                if !self.prefs.use_keyboard_shortcuts {
                    return if pressed {
                        Err(Rejection::KeyboardShortcutsDisabled.into())
                    } else {
                        Ok(Accepted::Unchanged)
                    };
                }
                if pressed {
                    self.jog_press(index, direction)
                } else {
                    self.jog_release(index)
                }
            }
            OperatorEvent::SelectIncrement(index) => Ok(self.jog.select_increment(index)?),
            OperatorEvent::JogVelocity(value) => {
                self.jog.set_velocity(value);
                Ok(Accepted::Unchanged)
            }
            OperatorEvent::SlowJog(slow) => {
                self.jog.set_slow(slow);
                Ok(Accepted::Unchanged)
            }
            OperatorEvent::Spindle(direction) => {
                self.state.selections.spindle = direction;
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.spindle.command_direction(
                    direction,
                    &self.status,
                    self.prefs.spindle_start_rpm,
                    allowed,
                    &mut link,
                )
            }
            OperatorEvent::Coolant { coolant, on } => {
                match coolant {
                    Coolant::Flood => self.state.selections.flood = on,
                    Coolant::Mist => self.state.selections.mist = on,
                }
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.spindle
                    .command_coolant(coolant, on, &self.status, allowed, &mut link)
            }
            OperatorEvent::Override { kind, percent } => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                let accepted =
                    self.spindle
                        .set_override(kind, percent, &self.status, allowed, &mut link)?;
                self.sync_overrides();
                Ok(accepted)
            }
            OperatorEvent::ResetOverride(kind) => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                let accepted = self
                    .spindle
                    .reset_override(kind, &self.status, allowed, &mut link)?;
                self.sync_overrides();
                Ok(accepted)
            }
            OperatorEvent::HomeAll => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing
                    .home_all(self.modes.state(), &self.status, allowed, &mut link)
            }
            OperatorEvent::HomeAxis(index) => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing
                    .home_axis(index, self.modes.state(), &self.status, allowed, &mut link)
            }
            OperatorEvent::ZeroAxis(axis) => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing
                    .zero_axis(axis, self.modes.state(), &self.status, allowed, &mut link)
            }
            OperatorEvent::SetAxisOffset { axis, value } => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing.set_axis_offset(
                    axis,
                    value,
                    self.modes.state(),
                    &self.status,
                    allowed,
                    &mut link,
                )
            }
            OperatorEvent::ZeroG92 => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing
                    .reset_g92(self.modes.state(), &self.status, allowed, &mut link)
            }
            OperatorEvent::GoToZero(kind) => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing
                    .go_to_zero(kind, self.modes.state(), allowed, &mut link)
            }
            OperatorEvent::TouchOff(kind) => {
                let mut link = CommandLink::new(&mut self.machine, &self.bus);
                self.homing
                    .touch_off(kind, self.modes.state(), &self.status, allowed, &mut link)
            }
            OperatorEvent::ConfirmToolChange => match self.toolchange.confirm() {
                Some(tool) => {
                    tracing::info!("Tool change to T{} confirmed", tool);
                    publish(
                        &self.bus,
                        ConsoleEvent::Machine(MachineEvent::ToolChangeConfirmed { tool }),
                    );
                    Ok(Accepted::Pending)
                }
                None => Ok(Accepted::Unchanged),
            },
            OperatorEvent::ToggleUnits => {
                self.state.display_units = self.state.display_units.toggled();
                tracing::info!("Display units {}", self.state.display_units);
                self.sync_units();
                Ok(Accepted::Unchanged)
            }
            OperatorEvent::BlockDelete(on) => {
                self.modes.ensure_commands_allowed()?;
                CommandLink::new(&mut self.machine, &self.bus).set_block_delete(on)?;
                self.prefs.block_delete = on;
                self.save_prefs();
                Ok(Accepted::Sent)
            }
            OperatorEvent::OptionalStop(on) => {
                self.modes.ensure_commands_allowed()?;
                CommandLink::new(&mut self.machine, &self.bus).set_optional_stop(on)?;
                self.prefs.optional_stop = on;
                self.save_prefs();
                Ok(Accepted::Sent)
            }
            OperatorEvent::IgnoreLimits => {
                self.modes.ensure_commands_allowed()?;
                if !self.status.any_limit_active() {
                    return Err(Rejection::NoLimitActive.into());
                }
                CommandLink::new(&mut self.machine, &self.bus).override_limits()?;
                Ok(Accepted::Sent)
            }
            OperatorEvent::Pause(pause) => self.pause(pause),
            OperatorEvent::Run => self.run_program(),
            OperatorEvent::RunFromLine(line) => {
                if !self.prefs.run_from_line {
                    return Err(Rejection::RunFromLineDisabled.into());
                }
                tracing::info!("Next run starts at line {}", line);
                self.state.restart_line = line;
                Ok(Accepted::Unchanged)
            }
            OperatorEvent::Stop => {
                self.modes.ensure_commands_allowed()?;
                CommandLink::new(&mut self.machine, &self.bus).abort()?;
                self.state.restart_line = 0;
                self.state.paused = false;
                Ok(Accepted::Sent)
            }
            OperatorEvent::Mdi(line) => self.mdi(&line),
            OperatorEvent::Preference { toggle, enabled } => {
                match toggle {
                    PreferenceToggle::ReloadTool => {
                        self.prefs.reload_tool = enabled && !self.config.traj.no_force_homing;
                    }
                    PreferenceToggle::RunFromLine => {
                        self.prefs.run_from_line = enabled;
                        if !enabled {
                            self.state.restart_line = 0;
                        }
                    }
                    PreferenceToggle::KeyboardShortcuts => {
                        self.prefs.use_keyboard_shortcuts = enabled;
                    }
                }
                self.save_prefs();
                Ok(Accepted::Unchanged)
            }
            OperatorEvent::SpindleStartRpm(rpm) => {
                if !rpm.is_finite() || rpm < 0.0 {
                    tracing::debug!("Ignoring spindle start speed {}", rpm);
                    return Ok(Accepted::Unchanged);
                }
                self.prefs.spindle_start_rpm = rpm;
                self.save_prefs();
                Ok(Accepted::Unchanged)
            }
        }
    }

    fn jog_press(
        &mut self,
        index: usize,
        direction: JogDirection,
    ) -> Result<Accepted, TransitionError> {
        let allowed = self.modes.commands_allowed();
        let factor = self.units.factor();
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        self.jog
            .press(index, direction, &self.status, allowed, factor, &mut link)
    }

    fn jog_release(&mut self, index: usize) -> Result<Accepted, TransitionError> {
        let allowed = self.modes.commands_allowed();
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        self.jog.release(index, &self.status, allowed, &mut link)
    }

    fn pause(&mut self, pause: bool) -> Result<Accepted, TransitionError> {
        self.modes.ensure_commands_allowed()?;
        let interp = self.status.interp_state;
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        if pause {
            if !interp.is_running() || interp == InterpState::Paused {
                return Ok(Accepted::Unchanged);
            }
            link.pause()?;
        } else {
            if interp != InterpState::Paused {
                self.state.paused = false;
                return Ok(Accepted::Unchanged);
            }
            link.resume()?;
        }
        self.state.paused = pause;
        Ok(Accepted::Sent)
    }

    fn run_program(&mut self) -> Result<Accepted, TransitionError> {
        self.modes.ensure_commands_allowed()?;
        if !self.modes.state().is_on() {
            return Err(Rejection::NotOn.into());
        }
        if self.status.task_mode != TaskMode::Auto {
            return Err(Rejection::WrongMode {
                required: TaskMode::Auto,
            }
            .into());
        }
        if !(self.homing.all_homed() || self.homing.no_force_homing()) {
            return Err(Rejection::NotAllHomed.into());
        }
        if self.status.interp_state != InterpState::Idle || self.toolchange.is_busy() {
            return Err(Rejection::InterpreterBusy.into());
        }
        let start_line = self.state.restart_line;
        tracing::info!("Running program from line {}", start_line);
        CommandLink::new(&mut self.machine, &self.bus).run_program(start_line)?;
        self.state.restart_line = 0;
        Ok(Accepted::Sent)
    }

    fn mdi(&mut self, line: &str) -> Result<Accepted, TransitionError> {
        self.modes.ensure_commands_allowed()?;
        match self.modes.state() {
            MachineState::On(TaskMode::Mdi) => {}
            MachineState::On(_) => {
                return Err(Rejection::WrongMode {
                    required: TaskMode::Mdi,
                }
                .into())
            }
            _ => return Err(Rejection::NotOn.into()),
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(Accepted::Unchanged);
        }
        CommandLink::new(&mut self.machine, &self.bus).execute_mdi(line)?;
        Ok(Accepted::Sent)
    }

    /// Run one status cycle.
    ///
    /// Fails only when the status poll fails; the loop must stop then.
    pub fn tick(&mut self) -> ControlResult<()> {
        let status = match self.machine.poll() {
            Ok(status) => status,
            Err(e) => {
                tracing::error!("{}", e);
                notify(&self.bus, Severity::Error, e.to_string());
                return Err(ControlError::PollFailed {
                    reason: e.to_string(),
                });
            }
        };
        let first = !self.initialized;

        self.drain_faults();
        self.sync_codes(&status);
        self.sync_mode(&status, first);
        self.sync_homing(&status, first);
        self.sync_interpreter(&status, first);
        self.sync_tool(&status, first);

        self.status = status;
        self.sync_spindle();
        self.sync_units();
        self.sync_program();
        self.sync_selections();
        self.sync_jog_state();
        self.sync_overrides();
        self.state.clock = chrono::Local::now().format("%H:%M:%S").to_string();
        self.state.coordinate_system = self.status.coordinate_system().to_string();

        if first {
            self.spindle.mark_initialized();
            self.initialized = true;
        }
        self.refresh_enablement();
        Ok(())
    }

    /// Power off and engage estop before exit
    pub fn shutdown(&mut self) -> ControlResult<()> {
        tracing::info!("Shutting down console");
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        link.set_state(TaskState::Off)?;
        link.set_state(TaskState::Estop)?;
        Ok(())
    }

    fn drain_faults(&mut self) {
        while let Some(fault) = self.machine.poll_error() {
            tracing::error!("Machine fault: {}", fault);
            notify(&self.bus, Severity::Error, fault.message.clone());
            publish(&self.bus, ConsoleEvent::Machine(MachineEvent::Fault(fault)));
        }
    }

    fn sync_codes(&mut self, status: &MachineStatus) {
        let gcodes = status.gcodes.join(" ");
        let mcodes = status.mcodes.join(" ");
        if gcodes == self.state.gcodes && mcodes == self.state.mcodes {
            return;
        }
        self.state.gcodes = gcodes.clone();
        self.state.mcodes = mcodes.clone();
        publish(
            &self.bus,
            ConsoleEvent::Machine(MachineEvent::CodesChanged { gcodes, mcodes }),
        );
    }

    fn sync_mode(&mut self, status: &MachineStatus, first: bool) {
        let ctx = self.mode_context();
        let previous = self.status.task_state;
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        let Some(observation) = reported(&self.bus, self.modes.observe(status, &ctx, &mut link))
        else {
            return;
        };

        if first {
            publish(
                &self.bus,
                ConsoleEvent::Machine(MachineEvent::StateChanged {
                    from: None,
                    to: status.task_state,
                }),
            );
        }

        for edge in observation.edges {
            match edge {
                ModeEdge::EnteredEstop
                | ModeEdge::EstopReset
                | ModeEdge::PoweredOff
                | ModeEdge::PoweredOn => {
                    publish(
                        &self.bus,
                        ConsoleEvent::Machine(MachineEvent::StateChanged {
                            from: Some(previous),
                            to: status.task_state,
                        }),
                    );
                    if edge == ModeEdge::EnteredEstop {
                        self.toolchange.cancel();
                        self.jog.clear();
                        self.state.paused = false;
                    }
                }
                ModeEdge::ModeChanged(mode) => {
                    publish(
                        &self.bus,
                        ConsoleEvent::Machine(MachineEvent::ModeChanged { mode }),
                    );
                    if mode == TaskMode::Manual && self.state.page != Page::Setup {
                        self.state.page = Page::Preview;
                    }
                }
            }
        }

        if let Some(rejection) = observation.rejection {
            tracing::warn!("{}", rejection);
            notify(&self.bus, rejection.severity(), rejection.to_string());
        }
    }

    fn sync_homing(&mut self, status: &MachineStatus, first: bool) {
        let Some(edge) = self.homing.observe(status) else {
            return;
        };
        let allowed = self.modes.commands_allowed();
        match edge {
            HomingEdge::AllHomed => {
                tracing::info!("All axes homed");
                self.state.all_homed = true;
                self.state.page = Page::Preview;
                publish(&self.bus, ConsoleEvent::Machine(MachineEvent::AllHomed));
                notify(&self.bus, Severity::Info, "All axes have been homed");
            }
            HomingEdge::NotAllHomed => {
                self.state.all_homed = false;
                if !first {
                    tracing::info!("Homing lost");
                    publish(&self.bus, ConsoleEvent::Machine(MachineEvent::HomingLost));
                }
            }
        }
        if !allowed {
            tracing::debug!("Estop latched, skipping homing follow-up");
            return;
        }
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        reported(
            &self.bus,
            self.homing
                .react(edge, status, &self.prefs, &mut self.toolchange, &mut link),
        );
    }

    fn sync_interpreter(&mut self, status: &MachineStatus, first: bool) {
        let now = status.interp_state;
        if !first && self.status.interp_state != now {
            tracing::debug!("Interpreter {:?}", now);
            publish(
                &self.bus,
                ConsoleEvent::Machine(MachineEvent::InterpreterChanged { state: now }),
            );
            if now == InterpState::Idle {
                self.state.current_line = 0;
                self.state.paused = false;
            }
        }
        if now.is_running() {
            self.state.current_line = status.current_line;
        }
    }

    fn sync_tool(&mut self, status: &MachineStatus, first: bool) {
        let allowed = self.modes.commands_allowed();
        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        let update = reported(
            &self.bus,
            self.toolchange
                .observe(status, &self.tools, allowed, &mut link),
        )
        .flatten();

        if let Some(update) = update {
            publish(
                &self.bus,
                ConsoleEvent::Machine(MachineEvent::ToolChanged {
                    from: update.from,
                    to: update.to,
                }),
            );
            if let Some(message) = update.prompt {
                notify(&self.bus, Severity::Info, message.clone());
                publish(
                    &self.bus,
                    ConsoleEvent::Machine(MachineEvent::ToolChangeRequested {
                        tool: update.to,
                        message,
                    }),
                );
            }
        }

        let tool = status.tool_in_spindle;
        if first || self.state.tool.number != tool {
            self.state.tool = ToolInfo {
                number: tool,
                diameter: self.tools.diameter(tool),
                comment: self.tools.description(tool),
            };
            if !first && self.prefs.tool_in_spindle != tool {
                self.prefs.tool_in_spindle = tool;
                self.save_prefs();
            }
        }

        let mut link = CommandLink::new(&mut self.machine, &self.bus);
        if let Some(true) = reported(
            &self.bus,
            self.toolchange.resume(status, allowed, &mut link),
        ) {
            tracing::info!("Tool change complete, back to manual");
        }
    }

    fn sync_spindle(&mut self) {
        let display = self.spindle.display(&self.status, self.state.tool.diameter);
        self.state.spindle_rpm = display.rpm;
        self.state.surface_speed = display.surface_speed;
    }

    fn sync_units(&mut self) {
        let machine = self.status.linear_units;
        let display = self.state.display_units;
        if self.units.update(machine, display, &mut self.jog) {
            publish(
                &self.bus,
                ConsoleEvent::Machine(MachineEvent::UnitsChanged { machine, display }),
            );
        }
        let factor = self.units.factor();
        self.state.unit_factor = factor;

        self.state.velocity = format_velocity(self.status.current_velocity, factor, machine);
        let (feed, real_feed) = format_feed(
            self.status.commanded_feed,
            self.status.feed_override,
            machine,
            self.status.has_gcode("G95"),
        );
        self.state.feed = feed;
        self.state.real_feed = real_feed;
    }

    fn sync_program(&mut self) {
        let file = self.status.file.clone();
        match file {
            Some(path) => {
                if self.program.as_ref().map(|(p, _)| p) != Some(&path) {
                    let length = match std::fs::read_to_string(&path) {
                        Ok(contents) => contents.lines().count(),
                        Err(e) => {
                            tracing::warn!("Cannot read {}: {}", path.display(), e);
                            0
                        }
                    };
                    tracing::info!("Program {} has {} lines", path.display(), length);
                    self.state.program_label = program_label(&path.to_string_lossy());
                    self.state.program_length = length;
                    self.program = Some((path, length));
                }
            }
            None => {
                self.program = None;
                self.state.program_label = NO_PROGRAM_LOADED.to_string();
                self.state.program_length = 0;
            }
        }

        if self.status.task_mode == TaskMode::Auto {
            let length = self.state.program_length;
            self.state.progress = if length > 0 {
                (self.status.current_line as f64 / length as f64).clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.state.progress_text = format!("{:.1} % Complete", self.state.progress * 100.0);
        }
    }

    fn sync_selections(&mut self) {
        let selections = &mut self.state.selections;
        selections.estop = self.status.task_state == TaskState::Estop;
        selections.power = self.status.is_on();
        selections.mode = self.status.task_mode;
        selections.spindle = self.status.spindle.direction;
        selections.flood = self.status.flood;
        selections.mist = self.status.mist;
    }

    fn sync_jog_state(&mut self) {
        self.state.jog_velocity = self.jog.slider().value;
        self.state.jog_increment = self.jog.selected_increment();
        self.state.slow_jog = self.jog.is_slow();
    }

    fn sync_overrides(&mut self) {
        let overrides = self.spindle.overrides();
        self.state.spindle_override = overrides.get(OverrideKind::Spindle);
        self.state.feed_override = overrides.get(OverrideKind::Feed);
        self.state.rapid_override = overrides.get(OverrideKind::Rapid);
    }

    fn mode_context(&self) -> ModeContext {
        ModeContext {
            page: self.state.page,
            mdi_available: self.state.enablement.mode_mdi,
            auto_available: self.state.enablement.mode_auto,
            tool_change_active: self.toolchange.is_active(),
        }
    }

    fn refresh_enablement(&mut self) {
        self.state.enablement = Enablement::derive(EnablementInputs {
            status: &self.status,
            state: self.modes.state(),
            commands_allowed: self.modes.commands_allowed(),
            all_homed: self.homing.all_homed(),
            no_force_homing: self.homing.no_force_homing(),
            tool_change_busy: self.toolchange.is_busy(),
            paused: self.state.paused,
        });
    }

    fn save_prefs(&mut self) {
        if let Err(e) = self.store.save(&self.prefs) {
            tracing::warn!("Could not save preferences: {}", e);
        }
    }
}

/// Drive `console` until `shutdown` resolves or the status feed fails.
///
/// Operator events arriving on `events` are handled between ticks. The
/// machine is powered off and put in estop on the way out.
pub async fn run<M, F>(
    console: &mut Console<M>,
    period: Duration,
    mut events: mpsc::UnboundedReceiver<OperatorEvent>,
    shutdown: F,
) -> ControlResult<()>
where
    M: MachineController,
    F: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested");
                break;
            }
            Some(event) = events.recv() => {
                let _ = console.handle(event);
            }
            _ = interval.tick() => {
                if let Err(e) = console.tick() {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    tracing::warn!("Status cycle failed: {}", e);
                }
            }
        }
    }

    console.shutdown()
}
