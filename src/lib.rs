//! # CNC Console
//!
//! Control core of an operator console for numerically-controlled machines.
//! It keeps the console's view of the machine in step with the controller
//! and decides which operator actions are allowed.
//!
//! ## Architecture
//!
//! The workspace is split into three crates:
//!
//! 1. **cncconsole-core** - Status snapshot, tool table, rejections, event bus
//! 2. **cncconsole-settings** - Machine configuration and persisted preferences
//! 3. **cncconsole-control** - Mode, jog, spindle, homing and tool change
//!    components plus the status sync loop
//! 4. **cncconsole** - Binary that wires the console to a controller
//!
//! ## Usage
//!
//! The binary reads operator events as JSON lines on stdin and runs the
//! status sync loop against the simulated controller until interrupted.

pub use cncconsole_control::{
    load_tool_table, run, Accepted, Console, ControlError, ControlResult, MachineController,
    OperatorEvent, SimulatedMachine, DEFAULT_POLL_PERIOD,
};
pub use cncconsole_core::{
    ConsoleEvent, EventBus, EventCategory, EventFilter, MachineStatus, Notification, Severity,
    ToolTable,
};
pub use cncconsole_settings::{
    ConsoleConfig, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting, on stderr so stdin/stdout stay free
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Route operator notices into the log
pub fn log_notifications(bus: &EventBus) {
    bus.subscribe(
        EventFilter::Categories(vec![EventCategory::Notification]),
        |event| {
            if let ConsoleEvent::Notification(notice) = event {
                match notice.severity {
                    Severity::Info => tracing::info!(target: "notice", "{}", notice.message),
                    Severity::Error => tracing::error!(target: "notice", "{}", notice.message),
                }
            }
        },
    );
}
