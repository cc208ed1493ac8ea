//! Spindle and override control
//!
//! Tracks the three override sliders (spindle, feed, rapid) and turns
//! spindle radio selections into spindle commands. The raw RPM sent to the
//! controller is divided by the controller's current spindle override, so
//! the machine ends up turning at the speed the console shows. Flood and
//! mist toggles are handled here as well.

use crate::event::{Accepted, Coolant, OverrideKind};
use crate::machine::{CommandLink, MachineController};
use cncconsole_core::{
    units::format_surface_speed, MachineStatus, Rejection, SpindleDirection, TaskMode, TaskState,
    TransitionError,
};
use cncconsole_settings::ConsoleConfig;
use std::f64::consts::PI;

/// Override slider positions in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideState {
    /// Spindle override
    pub spindle: f64,
    /// Feed override
    pub feed: f64,
    /// Rapid override
    pub rapid: f64,
}

impl Default for OverrideState {
    fn default() -> Self {
        Self {
            spindle: 100.0,
            feed: 100.0,
            rapid: 100.0,
        }
    }
}

impl OverrideState {
    /// Slider value for `kind`
    pub fn get(&self, kind: OverrideKind) -> f64 {
        match kind {
            OverrideKind::Spindle => self.spindle,
            OverrideKind::Feed => self.feed,
            OverrideKind::Rapid => self.rapid,
        }
    }

    fn slot(&mut self, kind: OverrideKind) -> &mut f64 {
        match kind {
            OverrideKind::Spindle => &mut self.spindle,
            OverrideKind::Feed => &mut self.feed,
            OverrideKind::Rapid => &mut self.rapid,
        }
    }
}

/// Slider ranges in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverrideLimits {
    spindle: (f64, f64),
    feed: (f64, f64),
    rapid: (f64, f64),
}

impl OverrideLimits {
    /// Ranges from the `[DISPLAY]` override factors
    pub fn from_config(config: &ConsoleConfig) -> Self {
        let d = &config.display;
        Self {
            spindle: (d.min_spindle_override * 100.0, d.max_spindle_override * 100.0),
            feed: (1.0, d.max_feed_override * 100.0),
            rapid: (1.0, d.max_rapid_override * 100.0),
        }
    }

    /// `(min, max)` for `kind`
    pub fn range(&self, kind: OverrideKind) -> (f64, f64) {
        match kind {
            OverrideKind::Spindle => self.spindle,
            OverrideKind::Feed => self.feed,
            OverrideKind::Rapid => self.rapid,
        }
    }
}

/// Spindle speed and surface speed as displayed
#[derive(Debug, Clone, PartialEq)]
pub struct SpindleDisplay {
    /// Live speed after override
    pub rpm: i64,
    /// Surface speed text
    pub surface_speed: String,
}

/// Spindle direction and override control
#[derive(Debug, Clone)]
pub struct SpindleController {
    overrides: OverrideState,
    limits: OverrideLimits,
    initialized: bool,
    effective_rpm: f64,
}

impl SpindleController {
    /// Controller with all sliders at 100%
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            overrides: OverrideState::default(),
            limits: OverrideLimits::from_config(config),
            initialized: false,
            effective_rpm: 0.0,
        }
    }

    /// Start forwarding slider moves to the machine
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Slider positions
    pub fn overrides(&self) -> OverrideState {
        self.overrides
    }

    /// Slider ranges
    pub fn limits(&self) -> OverrideLimits {
        self.limits
    }

    /// Live speed times the spindle slider, as of the last slider move
    pub fn effective_rpm(&self) -> f64 {
        self.effective_rpm
    }

    /// Move an override slider.
    ///
    /// Ignored until the console is initialized. A value of zero or below
    /// sends nothing; anything else is clamped to the slider range.
    pub fn set_override(
        &mut self,
        kind: OverrideKind,
        percent: f64,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if !self.initialized {
            tracing::debug!("Ignoring {:?} override before initialization", kind);
            return Ok(Accepted::Unchanged);
        }
        if !commands_allowed {
            return Err(Rejection::EstopActive.into());
        }
        if !percent.is_finite() || percent <= 0.0 {
            tracing::debug!("No {:?} override command for {}%", kind, percent);
            return Ok(Accepted::Unchanged);
        }

        let (min, max) = self.limits.range(kind);
        let percent = percent.clamp(min, max);
        *self.overrides.slot(kind) = percent;
        let factor = percent / 100.0;

        match kind {
            OverrideKind::Spindle => {
                let base = match status.spindle.direction {
                    SpindleDirection::Stopped => 0.0,
                    _ => status.spindle.speed.abs(),
                };
                self.effective_rpm = base * factor;
                link.spindle_override(factor)?;
            }
            OverrideKind::Feed => link.feed_override(factor)?,
            OverrideKind::Rapid => link.rapid_override(factor)?,
        }
        Ok(Accepted::Sent)
    }

    /// Put an override slider back to 100%
    pub fn reset_override(
        &mut self,
        kind: OverrideKind,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        self.set_override(kind, 100.0, status, commands_allowed, link)
    }

    /// Raw RPM for a manual spindle start.
    ///
    /// Uses the commanded S word, or `start_rpm` when none was given, scaled
    /// by the spindle slider and divided by the controller's override.
    pub fn raw_rpm(&self, status: &MachineStatus, start_rpm: f64) -> Option<f64> {
        let base = if status.spindle.commanded_speed == 0.0 {
            start_rpm
        } else {
            status.spindle.commanded_speed.abs()
        };
        let divisor = status.spindle.override_factor;
        if divisor == 0.0 {
            return None;
        }
        let rpm = base * self.overrides.spindle / 100.0 / divisor;
        rpm.is_finite().then_some(rpm)
    }

    /// Start, reverse or stop the spindle from the console radios.
    ///
    /// Refused in estop, and while a running program outside manual mode
    /// owns the spindle.
    pub fn command_direction(
        &mut self,
        direction: SpindleDirection,
        status: &MachineStatus,
        start_rpm: f64,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if status.task_state == TaskState::Estop || !commands_allowed {
            return Err(Rejection::EstopActive.into());
        }
        if !status.is_on() {
            return Err(Rejection::NotOn.into());
        }
        if status.task_mode != TaskMode::Manual && status.interp_state.is_running() {
            return Err(Rejection::SpindleUnderProgramControl.into());
        }

        if direction == SpindleDirection::Stopped {
            link.spindle(SpindleDirection::Stopped, 0.0)?;
            return Ok(Accepted::Sent);
        }
        let Some(rpm) = self.raw_rpm(status, start_rpm) else {
            tracing::debug!("No spindle command, override is {}", status.spindle.override_factor);
            return Ok(Accepted::Unchanged);
        };
        tracing::info!("Spindle {} at {:.0} rpm", direction, rpm);
        link.spindle(direction, rpm)?;
        Ok(Accepted::Sent)
    }

    /// Switch flood or mist coolant.
    ///
    /// Nothing is sent when the controller already reports the requested
    /// state, so re-syncing the toggle from status never echoes a command.
    pub fn command_coolant(
        &self,
        coolant: Coolant,
        on: bool,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        if status.task_state == TaskState::Estop || !commands_allowed {
            return Err(Rejection::EstopActive.into());
        }
        if !status.is_on() {
            return Err(Rejection::NotOn.into());
        }
        let current = match coolant {
            Coolant::Flood => status.flood,
            Coolant::Mist => status.mist,
        };
        if current == on {
            return Ok(Accepted::Unchanged);
        }
        match coolant {
            Coolant::Flood => link.flood(on)?,
            Coolant::Mist => link.mist(on)?,
        }
        Ok(Accepted::Sent)
    }

    /// Displayed speed and surface speed for the mounted tool
    pub fn display(&self, status: &MachineStatus, tool_diameter: f64) -> SpindleDisplay {
        let rpm = (status.spindle.speed * self.overrides.spindle / 100.0) as i64;
        let vc = match status.spindle.direction {
            SpindleDirection::Stopped => 0.0,
            _ => (rpm as f64 * tool_diameter * PI / 1000.0).abs(),
        };
        SpindleDisplay {
            rpm,
            surface_speed: format_surface_speed(vc),
        }
    }
}
