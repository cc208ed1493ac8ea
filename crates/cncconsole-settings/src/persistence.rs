//! Preference persistence
//!
//! Operator preferences survive restarts: the last mounted tool, whether to
//! reload it after homing, block delete / optional stop, and so on. The
//! console reaches storage only through [`PreferenceStore`], so tests run
//! against [`MemoryPreferenceStore`] and the binary against
//! [`FilePreferenceStore`].

use crate::config::{config_dir, ConsoleConfig};
use crate::error::SettingsResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persisted operator preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Speed used when starting the spindle without a commanded S word
    pub spindle_start_rpm: f64,
    /// Re-issue the last tool after homing
    pub reload_tool: bool,
    /// Tool mounted when the console last saw the machine
    pub tool_in_spindle: u32,
    /// Block delete switch
    pub block_delete: bool,
    /// Optional stop (M1) switch
    pub optional_stop: bool,
    /// Allow starting a program from a selected line
    pub run_from_line: bool,
    /// Route keyboard jog keys to the jog controller
    pub use_keyboard_shortcuts: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            spindle_start_rpm: 300.0,
            reload_tool: true,
            tool_in_spindle: 0,
            block_delete: true,
            optional_stop: true,
            run_from_line: false,
            use_keyboard_shortcuts: false,
        }
    }
}

impl Preferences {
    /// Defaults seeded from the console configuration.
    ///
    /// Without forced homing there is no all-homed edge to hang a reload
    /// on, so `reload_tool` is off.
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            spindle_start_rpm: config.display.default_spindle_speed,
            reload_tool: !config.traj.no_force_homing,
            ..Default::default()
        }
    }

    /// Apply constraints that depend on the configuration
    pub fn constrain(&mut self, config: &ConsoleConfig) {
        if config.traj.no_force_homing {
            self.reload_tool = false;
        }
    }
}

/// Storage for operator preferences
pub trait PreferenceStore: Send {
    /// Read stored preferences
    fn load(&self) -> SettingsResult<Preferences>;

    /// Persist preferences
    fn save(&mut self, prefs: &Preferences) -> SettingsResult<()>;
}

/// In-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    prefs: Preferences,
    saves: usize,
}

impl MemoryPreferenceStore {
    /// Create a store holding `prefs`
    pub fn new(prefs: Preferences) -> Self {
        Self { prefs, saves: 0 }
    }

    /// Currently stored preferences
    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    /// How many times `save` was called
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> SettingsResult<Preferences> {
        Ok(self.prefs.clone())
    }

    fn save(&mut self, prefs: &Preferences) -> SettingsResult<()> {
        self.prefs = prefs.clone();
        self.saves += 1;
        Ok(())
    }
}

/// TOML file store
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
    defaults: Preferences,
}

impl FilePreferenceStore {
    /// Store backed by `path`; `defaults` is returned while the file does not exist
    pub fn new(path: impl Into<PathBuf>, defaults: Preferences) -> Self {
        Self {
            path: path.into(),
            defaults,
        }
    }

    /// Store at `<config dir>/cncconsole/preferences.toml`
    pub fn default_location(defaults: Preferences) -> SettingsResult<Self> {
        Ok(Self::new(config_dir()?.join("preferences.toml"), defaults))
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> SettingsResult<Preferences> {
        if !self.path.exists() {
            tracing::debug!(
                "No preference file at {}, using defaults",
                self.path.display()
            );
            return Ok(self.defaults.clone());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&mut self, prefs: &Preferences) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, toml::to_string_pretty(prefs)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_counts_saves() {
        let mut store = MemoryPreferenceStore::default();
        let mut prefs = store.load().unwrap();
        prefs.tool_in_spindle = 4;
        store.save(&prefs).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap().tool_in_spindle, 4);
    }

    #[test]
    fn test_no_force_homing_disables_reload() {
        let mut config = ConsoleConfig::default();
        config.traj.no_force_homing = true;
        assert!(!Preferences::from_config(&config).reload_tool);

        let mut prefs = Preferences::default();
        assert!(prefs.reload_tool);
        prefs.constrain(&config);
        assert!(!prefs.reload_tool);
    }

    #[test]
    fn test_file_store_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePreferenceStore::new(
            dir.path().join("missing.toml"),
            Preferences {
                spindle_start_rpm: 1200.0,
                ..Default::default()
            },
        );
        assert_eq!(store.load().unwrap().spindle_start_rpm, 1200.0);
    }
}
