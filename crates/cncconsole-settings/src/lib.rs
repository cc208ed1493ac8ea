//! CNC Console Settings Crate
//!
//! Handles the static console configuration and the persisted operator
//! preferences.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    config_dir, ConsoleConfig, DisplaySettings, EmcioSettings, TrajSettings, DEFAULT_INCREMENTS,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
pub use persistence::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences};
