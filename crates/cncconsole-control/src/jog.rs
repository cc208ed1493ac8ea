//! Jogging
//!
//! The jog controller owns the velocity slider (display units per minute),
//! the fast/slow toggle, the configured increment list, and the set of jogs
//! currently running. A press starts a continuous jog, or an incremental
//! one when an increment is selected; a release stops continuous jogs
//! only.

use crate::event::Accepted;
use crate::machine::{CommandLink, JogDirection, JogKind, JogMode, JogRequest, MachineController};
use crate::units::Rescale;
use cncconsole_core::{
    units::{parse_increment, split_increments},
    LinearUnits, MachineStatus, MotionMode, Rejection, TaskMode, TransitionError,
};
use cncconsole_settings::{ConsoleConfig, DEFAULT_INCREMENTS};
use std::collections::HashMap;

/// Most increments offered on the console
pub const MAX_INCREMENTS: usize = 10;

/// Ratio between the fast and slow slider ranges
pub const SLOW_JOG_FACTOR: f64 = 10.0;

/// Lower bound of the jog slider, display units per minute
const MIN_JOG_VELOCITY: f64 = 100.0;

/// One selectable jog increment
#[derive(Debug, Clone, PartialEq)]
pub struct Increment {
    /// Text as configured
    pub label: String,
    /// Distance in machine units
    pub distance: f64,
}

/// Parse the configured increment list.
///
/// Entries that fail to parse are skipped. More than
/// [`MAX_INCREMENTS`] entries are cut to the first ten.
pub fn parse_increments(input: &str, machine: LinearUnits) -> Vec<Increment> {
    let mut entries = split_increments(input);
    if entries.is_empty() {
        entries = split_increments(DEFAULT_INCREMENTS);
    }
    if entries.len() > MAX_INCREMENTS {
        tracing::warn!(
            "Increment list shortened to {}, {} entries configured",
            MAX_INCREMENTS,
            entries.len()
        );
        entries.truncate(MAX_INCREMENTS);
    }

    entries
        .into_iter()
        .filter_map(|label| match parse_increment(&label, machine) {
            Ok(distance) if distance > 0.0 => Some(Increment { label, distance }),
            Ok(_) => {
                tracing::warn!("Ignoring non-positive jog increment '{}'", label);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring jog increment '{}': {}", label, e);
                None
            }
        })
        .collect()
}

/// Jog velocity slider
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JogSlider {
    /// Current value
    pub value: f64,
    /// Lower bound
    pub min: f64,
    /// Upper bound
    pub max: f64,
}

impl JogSlider {
    fn set(&mut self, value: f64) {
        self.value = value.clamp(self.min, self.max);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveJog {
    mode: JogMode,
    kind: JogKind,
}

/// Jog controller
#[derive(Debug, Clone)]
pub struct JogController {
    increments: Vec<Increment>,
    selected: usize,
    slider: JogSlider,
    slow: bool,
    fast_memory: f64,
    slow_memory: f64,
    active: HashMap<usize, ActiveJog>,
}

impl JogController {
    /// Build from configuration; slider values are in machine units per minute
    pub fn new(config: &ConsoleConfig) -> Self {
        let max = config.traj.max_linear_velocity * 60.0;
        let default = config.traj.default_linear_velocity * 60.0;
        let min = MIN_JOG_VELOCITY.min(max);
        Self {
            increments: parse_increments(&config.display.increments, config.traj.linear_units),
            selected: 0,
            slider: JogSlider {
                value: default.clamp(min, max),
                min,
                max,
            },
            slow: false,
            fast_memory: default,
            slow_memory: default / SLOW_JOG_FACTOR,
            active: HashMap::new(),
        }
    }

    /// Configured increments; index 0 of the selection is continuous
    pub fn increments(&self) -> &[Increment] {
        &self.increments
    }

    /// Selected increment index
    pub fn selected_increment(&self) -> usize {
        self.selected
    }

    /// Jog distance in machine units, 0 for continuous
    pub fn distance(&self) -> f64 {
        match self.selected {
            0 => 0.0,
            n => self.increments[n - 1].distance,
        }
    }

    /// Select an increment, 0 for continuous
    pub fn select_increment(&mut self, index: usize) -> Result<Accepted, Rejection> {
        if index > self.increments.len() {
            return Err(Rejection::UnknownIncrement { index });
        }
        self.selected = index;
        tracing::debug!("Jog increment {} ({})", index, self.distance());
        Ok(Accepted::Unchanged)
    }

    /// Slider state
    pub fn slider(&self) -> JogSlider {
        self.slider
    }

    /// Move the slider; the value is clamped to its range
    pub fn set_velocity(&mut self, value: f64) {
        if value.is_finite() {
            self.slider.set(value);
        }
    }

    /// Slow range selected
    pub fn is_slow(&self) -> bool {
        self.slow
    }

    /// Remembered fast and slow slider values
    pub fn memories(&self) -> (f64, f64) {
        (self.fast_memory, self.slow_memory)
    }

    /// Switch between the fast and slow slider range.
    ///
    /// The slider value of the range being left is remembered and restored
    /// when switching back to fast.
    pub fn set_slow(&mut self, slow: bool) {
        if slow == self.slow {
            return;
        }
        if slow {
            self.fast_memory = self.slider.value;
            self.slider.min /= SLOW_JOG_FACTOR;
            self.slider.max /= SLOW_JOG_FACTOR;
            self.slider.set(self.fast_memory / SLOW_JOG_FACTOR);
        } else {
            self.slow_memory = self.slider.value;
            self.slider.min *= SLOW_JOG_FACTOR;
            self.slider.max *= SLOW_JOG_FACTOR;
            self.slider.set(self.fast_memory);
        }
        self.slow = slow;
    }

    /// Jog velocity in machine units per second.
    ///
    /// `None` when the unit factor cannot be divided by.
    pub fn velocity(&self, factor: f64) -> Option<f64> {
        if factor == 0.0 || !factor.is_finite() {
            return None;
        }
        let velocity = self.slider.value / 60.0 / factor;
        velocity.is_finite().then_some(velocity)
    }

    /// Whether any continuous or incremental jog is tracked
    pub fn is_jogging(&self) -> bool {
        !self.active.is_empty()
    }

    /// Forget running jogs; the machine stops them on estop
    pub fn clear(&mut self) {
        self.active.clear();
    }

    fn check_gate(
        status: &MachineStatus,
        commands_allowed: bool,
        index: usize,
    ) -> Result<(), Rejection> {
        if !commands_allowed
            || !status.enabled
            || !status.is_on()
            || status.task_mode != TaskMode::Manual
        {
            return Err(Rejection::JogInhibited);
        }
        if index >= status.axes.len() {
            return Err(Rejection::UnknownAxis);
        }
        Ok(())
    }

    // Joint addressing on a free-mode machine; identity kinematics are put
    // into teleop first and jogged per axis.
    fn resolve_mode(
        status: &MachineStatus,
        link: &mut CommandLink<'_>,
    ) -> Result<JogMode, TransitionError> {
        if status.motion_mode != MotionMode::Free {
            return Ok(JogMode::Axis);
        }
        if status.kinematics.is_identity() {
            tracing::debug!("Switching identity machine to teleop before jogging");
            link.set_motion_mode_and_wait(true)?;
            Ok(JogMode::Axis)
        } else {
            Ok(JogMode::Joint)
        }
    }

    /// Start a jog on `index`
    pub fn press(
        &mut self,
        index: usize,
        direction: JogDirection,
        status: &MachineStatus,
        commands_allowed: bool,
        factor: f64,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        Self::check_gate(status, commands_allowed, index)?;
        let mode = Self::resolve_mode(status, link)?;
        let Some(speed) = self.velocity(factor) else {
            tracing::debug!("No jog velocity for factor {}", factor);
            return Ok(Accepted::Unchanged);
        };

        let request = JogRequest {
            index,
            direction,
            kind: JogKind::from_distance(self.distance()),
            mode,
            velocity: direction.sign() * speed,
        };
        link.jog(request)?;
        self.active.insert(
            index,
            ActiveJog {
                mode,
                kind: request.kind,
            },
        );
        Ok(Accepted::Sent)
    }

    /// Stop a continuous jog on `index`; incremental jogs stop on their own
    pub fn release(
        &mut self,
        index: usize,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Accepted, TransitionError> {
        Self::check_gate(status, commands_allowed, index)?;
        let mode = match self.active.remove(&index) {
            Some(ActiveJog {
                kind: JogKind::Incremental { .. },
                ..
            }) => return Ok(Accepted::Unchanged),
            Some(ActiveJog { mode, .. }) => mode,
            None if self.distance() != 0.0 => return Ok(Accepted::Unchanged),
            None => Self::resolve_mode(status, link)?,
        };
        link.jog_stop(mode, index)?;
        Ok(Accepted::Sent)
    }
}

impl Rescale for JogController {
    fn rescale(&mut self, factor: f64) {
        self.slider.value *= factor;
        self.slider.min *= factor;
        self.slider.max *= factor;
        self.fast_memory *= factor;
        self.slow_memory *= factor;
    }
}
