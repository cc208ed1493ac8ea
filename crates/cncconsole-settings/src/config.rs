//! Console configuration
//!
//! Static machine configuration read once at startup. The layout follows the
//! controller's INI file sections:
//! - `display`: jog increments, override limits, default spindle speed
//! - `traj`: linear velocities, machine units, axis letters, force-homing
//! - `emcio`: tool table location
//!
//! Supports JSON and TOML file formats, chosen by file extension.

use crate::error::{ConfigError, SettingsError, SettingsResult};
use cncconsole_core::LinearUnits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Jog increments offered when none are configured
pub const DEFAULT_INCREMENTS: &str = "1.000 0.100 0.010 0.001";

/// `[DISPLAY]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Jog increments, comma or whitespace separated
    pub increments: String,
    /// Maximum spindle override as a factor (1.2 = 120%)
    pub max_spindle_override: f64,
    /// Minimum spindle override as a factor
    pub min_spindle_override: f64,
    /// Maximum feed override as a factor
    pub max_feed_override: f64,
    /// Maximum rapid override as a factor
    pub max_rapid_override: f64,
    /// Spindle speed used when no S word has been given
    pub default_spindle_speed: f64,
    /// Units the console displays in, machine units when unset
    pub display_units: Option<LinearUnits>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            increments: DEFAULT_INCREMENTS.to_string(),
            max_spindle_override: 1.2,
            min_spindle_override: 0.5,
            max_feed_override: 1.2,
            max_rapid_override: 1.0,
            default_spindle_speed: 300.0,
            display_units: None,
        }
    }
}

/// `[TRAJ]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajSettings {
    /// Axis letters present on the machine
    pub coordinates: String,
    /// Machine linear units
    pub linear_units: LinearUnits,
    /// Default jog velocity in machine units per second
    pub default_linear_velocity: f64,
    /// Maximum jog velocity in machine units per second
    pub max_linear_velocity: f64,
    /// Allow operation without homing first
    pub no_force_homing: bool,
}

impl Default for TrajSettings {
    fn default() -> Self {
        Self {
            coordinates: "XYZ".to_string(),
            linear_units: LinearUnits::Mm,
            default_linear_velocity: 15.0,
            max_linear_velocity: 50.0,
            no_force_homing: false,
        }
    }
}

/// `[EMCIO]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmcioSettings {
    /// Path of the tool table file
    pub tool_table: Option<PathBuf>,
}

/// Complete console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Display settings
    pub display: DisplaySettings,
    /// Trajectory settings
    pub traj: TrajSettings,
    /// Tool I/O settings
    pub emcio: EmcioSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
    }
}

impl ConsoleConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded console configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a `.json` or `.toml` file
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Default location: `<config dir>/cncconsole/config.toml`
    pub fn default_path() -> SettingsResult<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let d = &self.display;
        if d.min_spindle_override <= 0.0 {
            return Err(out_of_range(
                "display.min_spindle_override",
                d.min_spindle_override,
            ));
        }
        if d.max_spindle_override < d.min_spindle_override {
            return Err(SettingsError::invalid(
                "display.max_spindle_override",
                "must not be below min_spindle_override",
            ));
        }
        if d.max_feed_override <= 0.0 {
            return Err(out_of_range("display.max_feed_override", d.max_feed_override));
        }
        if d.max_rapid_override <= 0.0 {
            return Err(out_of_range(
                "display.max_rapid_override",
                d.max_rapid_override,
            ));
        }
        if d.default_spindle_speed < 0.0 {
            return Err(out_of_range(
                "display.default_spindle_speed",
                d.default_spindle_speed,
            ));
        }

        let t = &self.traj;
        if t.max_linear_velocity <= 0.0 {
            return Err(out_of_range("traj.max_linear_velocity", t.max_linear_velocity));
        }
        if t.default_linear_velocity <= 0.0 || t.default_linear_velocity > t.max_linear_velocity
        {
            return Err(SettingsError::invalid(
                "traj.default_linear_velocity",
                "must be > 0 and not above max_linear_velocity",
            ));
        }
        if t.coordinates.is_empty() {
            return Err(SettingsError::invalid("traj.coordinates", "no axes configured"));
        }
        if let Some(bad) = t
            .coordinates
            .chars()
            .find(|c| cncconsole_core::axis_index(*c).is_none())
        {
            return Err(SettingsError::invalid(
                "traj.coordinates",
                format!("unknown axis letter '{}'", bad),
            ));
        }

        Ok(())
    }

    /// Number of axes configured
    pub fn num_axes(&self) -> usize {
        self.traj.coordinates.chars().count()
    }

    /// Units the console starts displaying in
    pub fn display_units(&self) -> LinearUnits {
        self.display.display_units.unwrap_or(self.traj.linear_units)
    }
}

fn out_of_range(key: &str, value: f64) -> SettingsError {
    ConfigError::ValueOutOfRange {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// `<config dir>/cncconsole`
pub fn config_dir() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("cncconsole"))
        .ok_or_else(|| {
            ConfigError::UnsupportedPlatform(std::env::consts::OS.to_string()).into()
        })
}
