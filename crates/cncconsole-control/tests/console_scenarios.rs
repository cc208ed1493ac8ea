use cncconsole_control::{
    Accepted, Console, Coolant, JogDirection, JogKind, JogMode, JogRequest, MachineCommand,
    OperatorEvent, OverrideKind, Page, SimulatedMachine, TouchOffKind, ZeroMove,
};
use cncconsole_core::{
    ConsoleEvent, EventBus, InterpState, MachineEvent, MachineRejection, Rejection, Severity,
    SpindleDirection, TaskMode, TaskState, ToolEntry, ToolTable,
};
use cncconsole_settings::{ConsoleConfig, MemoryPreferenceStore, Preferences};
use std::sync::Arc;
use tokio::sync::broadcast;

fn build(sim: SimulatedMachine, config: ConsoleConfig, prefs: Preferences) -> Console<SimulatedMachine> {
    let mut tools = ToolTable::new();
    tools.insert(ToolEntry::new(3, 3, 3.0).with_comment("3mm drill"));
    tools.insert(ToolEntry::new(7, 7, 6.0).with_comment("6mm end mill"));
    Console::new(
        sim,
        config,
        Box::new(MemoryPreferenceStore::new(prefs)),
        tools,
        Arc::new(EventBus::new()),
    )
    .unwrap()
}

fn console() -> Console<SimulatedMachine> {
    build(
        SimulatedMachine::new(3),
        ConsoleConfig::default(),
        Preferences::default(),
    )
}

// Estop reset, power on, and let the console see it.
fn bring_up(console: &mut Console<SimulatedMachine>) {
    console.tick().unwrap();
    assert_eq!(
        console.handle(OperatorEvent::Estop(false)),
        Ok(Accepted::Sent)
    );
    console.tick().unwrap();
    assert_eq!(console.handle(OperatorEvent::Power(true)), Ok(Accepted::Sent));
    console.tick().unwrap();
    console.machine_mut().clear_commands();
}

fn notices(rx: &mut broadcast::Receiver<ConsoleEvent>) -> Vec<(Severity, String)> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ConsoleEvent::Notification(n) = event {
            out.push((n.severity, n.message));
        }
    }
    out
}

fn jog_plus_x() -> OperatorEvent {
    OperatorEvent::JogPress {
        index: 0,
        direction: JogDirection::Positive,
    }
}

#[test]
fn test_bring_up_enables_on_group() {
    let mut console = console();
    bring_up(&mut console);

    let state = console.state();
    assert!(console.modes().commands_allowed());
    assert!(state.enablement.on_off);
    assert!(state.enablement.jog);
    assert!(state.selections.power);
    assert!(!state.selections.estop);
    assert_eq!(state.selections.mode, TaskMode::Manual);
    assert!(!state.enablement.all_homed);
}

#[test]
fn test_jog_press_needs_on_and_manual() {
    let mut config = ConsoleConfig::default();
    config.traj.no_force_homing = true;
    let mut console = build(SimulatedMachine::new(3), config, Preferences::default());
    console.tick().unwrap();

    assert_eq!(
        console.handle(jog_plus_x()),
        Err(Rejection::JogInhibited.into())
    );
    assert!(console.machine().commands().is_empty());

    bring_up(&mut console);
    assert_eq!(console.handle(jog_plus_x()), Ok(Accepted::Sent));
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetMotionMode { teleop: true },
            MachineCommand::Jog(JogRequest {
                index: 0,
                direction: JogDirection::Positive,
                kind: JogKind::Continuous,
                mode: JogMode::Axis,
                velocity: 15.0,
            }),
        ]
    );
    assert_eq!(
        console.handle(OperatorEvent::JogRelease { index: 0 }),
        Ok(Accepted::Sent)
    );
    assert_eq!(
        console.machine().commands().last(),
        Some(&MachineCommand::JogStop {
            mode: JogMode::Axis,
            index: 0
        })
    );

    assert_eq!(
        console.handle(OperatorEvent::SelectMode(TaskMode::Mdi)),
        Ok(Accepted::Pending)
    );
    console.tick().unwrap();
    assert_eq!(console.status().task_mode, TaskMode::Mdi);
    console.machine_mut().clear_commands();

    assert_eq!(
        console.handle(jog_plus_x()),
        Err(Rejection::JogInhibited.into())
    );
    assert!(console.machine().commands().is_empty());
}

#[test]
fn test_incremental_jog_needs_no_release() {
    let mut console = console();
    bring_up(&mut console);
    console.machine_mut().status_mut().motion_mode = cncconsole_core::MotionMode::Teleop;
    console.tick().unwrap();
    console.machine_mut().clear_commands();

    assert_eq!(
        console.handle(OperatorEvent::SelectIncrement(2)),
        Ok(Accepted::Unchanged)
    );
    assert_eq!(console.handle(jog_plus_x()), Ok(Accepted::Sent));
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::Jog(JogRequest {
            index: 0,
            direction: JogDirection::Positive,
            kind: JogKind::Incremental { distance: 0.1 },
            mode: JogMode::Axis,
            velocity: 15.0,
        })]
    );

    assert_eq!(
        console.handle(OperatorEvent::JogRelease { index: 0 }),
        Ok(Accepted::Unchanged)
    );
    assert!(!console
        .machine()
        .commands()
        .contains(&MachineCommand::Mist(true)));
}

#[test]
fn test_keyboard_jog_follows_preference() {
    let mut console = console();
    bring_up(&mut console);
    let mut rx = console.bus().receiver();

    let key = OperatorEvent::JogKey {
        index: 1,
        direction: JogDirection::Negative,
        pressed: true,
    };
    assert_eq!(
        console.handle(key.clone()),
        Err(Rejection::KeyboardShortcutsDisabled.into())
    );
    assert!(notices(&mut rx).contains(&(
        Severity::Info,
        "Keyboard shortcuts are disabled".to_string()
    )));

    console
        .handle(OperatorEvent::Preference {
            toggle: cncconsole_control::PreferenceToggle::KeyboardShortcuts,
            enabled: true,
        })
        .unwrap();
    assert!(console.prefs().use_keyboard_shortcuts);
    assert_eq!(console.handle(key), Ok(Accepted::Sent));
}

#[test]
fn test_estop_mid_homing_latches_every_component() {
    let mut console = console();
    bring_up(&mut console);

    assert_eq!(console.handle(OperatorEvent::HomeAll), Ok(Accepted::Sent));
    assert_eq!(console.handle(OperatorEvent::Estop(true)), Ok(Accepted::Sent));
    console.machine_mut().clear_commands();

    let attempts = vec![
        jog_plus_x(),
        OperatorEvent::Spindle(SpindleDirection::Forward),
        OperatorEvent::HomeAll,
        OperatorEvent::HomeAxis(0),
        OperatorEvent::ZeroAxis('x'),
        OperatorEvent::Override {
            kind: OverrideKind::Feed,
            percent: 50.0,
        },
        OperatorEvent::SelectMode(TaskMode::Mdi),
        OperatorEvent::Power(true),
        OperatorEvent::Mdi("G0 X0".to_string()),
        OperatorEvent::Run,
        OperatorEvent::Stop,
    ];
    for event in attempts {
        assert!(console.handle(event.clone()).is_err(), "{:?} accepted", event);
    }
    assert!(console.machine().commands().is_empty());

    // The homed edge arrives while latched: no follow-up sequence.
    console.tick().unwrap();
    assert!(console.state().all_homed);
    assert!(!console
        .machine()
        .commands()
        .iter()
        .any(|c| matches!(c, MachineCommand::SetMotionMode { .. } | MachineCommand::Mdi(_))));
    assert!(!console.state().enablement.on_off);

    assert_eq!(
        console.handle(OperatorEvent::Estop(false)),
        Ok(Accepted::Sent)
    );
    assert!(console.modes().commands_allowed());
    assert_eq!(console.handle(OperatorEvent::Power(true)), Ok(Accepted::Sent));
}

#[test]
fn test_estop_cancels_tool_change() {
    let mut sim = SimulatedMachine::new(3);
    sim.status_mut().tool_in_spindle = 3;
    let mut console = build(sim, ConsoleConfig::default(), Preferences::default());
    bring_up(&mut console);

    console.machine_mut().status_mut().tool_in_spindle = 7;
    console.tick().unwrap();
    assert!(console.toolchange().request().pending);

    console.handle(OperatorEvent::Estop(true)).unwrap();
    assert!(!console.toolchange().request().pending);
    assert_eq!(
        console.handle(OperatorEvent::ConfirmToolChange),
        Ok(Accepted::Unchanged)
    );
    console.tick().unwrap();
    assert_eq!(console.modes().state(), cncconsole_control::MachineState::Estop);
    assert!(!console.state().enablement.jog);
}

#[test]
fn test_estop_toggled_between_ticks_still_allows_power() {
    let mut console = console();
    bring_up(&mut console);

    console.handle(OperatorEvent::Estop(true)).unwrap();
    assert!(!console.modes().commands_allowed());
    assert_eq!(
        console.handle(OperatorEvent::Estop(false)),
        Ok(Accepted::Sent)
    );
    for _ in 0..3 {
        console.tick().unwrap();
        assert!(console.modes().commands_allowed());
    }
    assert!(console.state().enablement.power);
    assert_eq!(console.handle(OperatorEvent::Power(true)), Ok(Accepted::Sent));
    console.tick().unwrap();
    assert!(console.state().enablement.on_off);
}

#[test]
fn test_external_estop_rolls_back() {
    let mut sim = SimulatedMachine::new(3);
    sim.set_external_estop(true);
    let mut console = build(sim, ConsoleConfig::default(), Preferences::default());
    console.tick().unwrap();
    let mut rx = console.bus().receiver();

    assert_eq!(
        console.handle(OperatorEvent::Estop(false)),
        Err(MachineRejection::ExternalEstop.into())
    );
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetState(TaskState::EstopReset),
            MachineCommand::SetState(TaskState::Estop),
        ]
    );
    assert!(console.state().selections.estop);
    assert!(!console.modes().commands_allowed());
    assert!(notices(&mut rx).contains(&(
        Severity::Error,
        "External ESTOP is set, could not change state!".to_string()
    )));
}

#[test]
fn test_power_on_failure_rolls_back() {
    let mut sim = SimulatedMachine::new(3);
    sim.set_power_fault(true);
    let mut console = build(sim, ConsoleConfig::default(), Preferences::default());
    console.tick().unwrap();
    console.handle(OperatorEvent::Estop(false)).unwrap();
    console.tick().unwrap();

    assert_eq!(
        console.handle(OperatorEvent::Power(true)),
        Err(MachineRejection::PowerOnFailed.into())
    );
    assert!(!console.state().selections.power);
    console.tick().unwrap();
    assert!(!console.state().enablement.on_off);
    assert!(console.state().enablement.power);
}

#[test]
fn test_home_all_toggles_and_reloads_tool() {
    let prefs = Preferences {
        reload_tool: true,
        tool_in_spindle: 4,
        ..Default::default()
    };
    let mut console = build(SimulatedMachine::new(3), ConsoleConfig::default(), prefs);
    bring_up(&mut console);
    let mut rx = console.bus().receiver();

    assert_eq!(console.handle(OperatorEvent::HomeAll), Ok(Accepted::Sent));
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetMotionMode { teleop: false },
            MachineCommand::Home(None),
        ]
    );
    console.machine_mut().clear_commands();

    console.tick().unwrap();
    assert!(console.state().all_homed);
    assert_eq!(console.state().page, Page::Preview);
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetMode(TaskMode::Manual),
            MachineCommand::SetMotionMode { teleop: true },
            MachineCommand::SetMode(TaskMode::Mdi),
            MachineCommand::Mdi("M61 Q4 G43".to_string()),
            MachineCommand::SetMode(TaskMode::Manual),
        ]
    );
    assert!(notices(&mut rx).contains(&(Severity::Info, "All axes have been homed".to_string())));

    // The reloaded tool shows up without a prompt.
    console.machine_mut().clear_commands();
    console.tick().unwrap();
    assert!(!console.toolchange().request().pending);
    assert_eq!(console.state().tool.number, 4);
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::SetMode(TaskMode::Manual)]
    );
    assert!(!console.toolchange().is_active());
    assert!(notices(&mut rx)
        .iter()
        .all(|(_, m)| !m.starts_with("Please change")));

    console.machine_mut().clear_commands();
    assert_eq!(console.handle(OperatorEvent::HomeAll), Ok(Accepted::Sent));
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetMotionMode { teleop: false },
            MachineCommand::Unhome(None),
        ]
    );
    console.tick().unwrap();
    assert!(!console.state().all_homed);
    assert!(!console.state().enablement.all_homed);
}

#[test]
fn test_spindle_override_scales_display() {
    let mut config = ConsoleConfig::default();
    config.display.max_spindle_override = 1.5;
    let mut console = build(SimulatedMachine::new(3), config, Preferences::default());
    bring_up(&mut console);

    {
        let spindle = &mut console.machine_mut().status_mut().spindle;
        spindle.direction = SpindleDirection::Forward;
        spindle.speed = 1000.0;
    }
    console.tick().unwrap();
    assert_eq!(console.state().spindle_rpm, 1000);

    assert_eq!(
        console.handle(OperatorEvent::Override {
            kind: OverrideKind::Spindle,
            percent: 150.0,
        }),
        Ok(Accepted::Sent)
    );
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::SpindleOverride(1.5)]
    );
    assert_eq!(console.spindle().effective_rpm(), 1500.0);
    console.tick().unwrap();
    assert_eq!(console.state().spindle_rpm, 1500);
    assert_eq!(console.state().spindle_override, 150.0);
}

#[test]
fn test_zero_override_sends_nothing() {
    let mut console = console();
    bring_up(&mut console);
    assert_eq!(
        console.handle(OperatorEvent::Override {
            kind: OverrideKind::Spindle,
            percent: 0.0,
        }),
        Ok(Accepted::Unchanged)
    );
    assert!(console.machine().commands().is_empty());
}

#[test]
fn test_spindle_refused_under_program_control() {
    let mut config = ConsoleConfig::default();
    config.traj.no_force_homing = true;
    let mut console = build(SimulatedMachine::new(3), config, Preferences::default());
    bring_up(&mut console);
    {
        let status = console.machine_mut().status_mut();
        status.task_mode = TaskMode::Auto;
        status.interp_state = InterpState::Reading;
        status.spindle.direction = SpindleDirection::Forward;
        status.spindle.speed = 800.0;
    }
    console.tick().unwrap();
    console.machine_mut().clear_commands();

    assert_eq!(
        console.handle(OperatorEvent::Spindle(SpindleDirection::Reverse)),
        Err(Rejection::SpindleUnderProgramControl.into())
    );
    assert!(console.machine().commands().is_empty());
    let enablement = console.state().enablement;
    assert!(enablement.spindle_forward);
    assert!(!enablement.spindle_reverse);
    assert!(!enablement.spindle_stop);
}

#[test]
fn test_tool_change_prompt_and_confirm() {
    let mut sim = SimulatedMachine::new(3);
    sim.status_mut().tool_in_spindle = 3;
    let mut console = build(sim, ConsoleConfig::default(), Preferences::default());
    bring_up(&mut console);
    assert_eq!(console.state().tool.comment, "3mm drill");
    let mut rx = console.bus().receiver();

    console.machine_mut().status_mut().tool_in_spindle = 7;
    console.tick().unwrap();

    let request = console.toolchange().request();
    assert!(request.pending);
    assert_eq!(request.tool, 7);
    assert!(!console.toolchange().changed());
    assert!(!console.state().enablement.run_idle);
    assert_eq!(console.state().tool.diameter, 6.0);
    assert_eq!(console.prefs().tool_in_spindle, 7);

    let mut prompted = false;
    while let Ok(event) = rx.try_recv() {
        if let ConsoleEvent::Machine(MachineEvent::ToolChangeRequested { tool, message }) = event {
            assert_eq!(tool, 7);
            assert_eq!(message, "Please change to tool # 7: 6mm end mill (D6.000)");
            prompted = true;
        }
    }
    assert!(prompted);

    assert_eq!(
        console.handle(OperatorEvent::ConfirmToolChange),
        Ok(Accepted::Pending)
    );
    assert!(console.toolchange().changed());
    assert!(!console.toolchange().request().pending);
    console.tick().unwrap();
    assert!(console.state().enablement.run_idle);
}

#[test]
fn test_tool_removal_prompt() {
    let mut sim = SimulatedMachine::new(3);
    sim.status_mut().tool_in_spindle = 3;
    let mut console = build(sim, ConsoleConfig::default(), Preferences::default());
    bring_up(&mut console);
    let mut rx = console.bus().receiver();

    console.machine_mut().status_mut().tool_in_spindle = 0;
    console.tick().unwrap();
    assert!(notices(&mut rx).contains(&(
        Severity::Info,
        "Please remove the mounted tool".to_string()
    )));
    assert_eq!(console.state().tool.comment, "NO TOOL LOADED");
    assert!(!console.state().enablement.touch_off);
}

#[test]
fn test_unavailable_mode_returns_to_manual() {
    let mut console = console();
    bring_up(&mut console);
    let mut rx = console.bus().receiver();

    assert_eq!(
        console.handle(OperatorEvent::SelectMode(TaskMode::Mdi)),
        Err(MachineRejection::ModeUnavailable {
            mode: TaskMode::Mdi
        }
        .into())
    );
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::Abort, MachineCommand::SetMode(TaskMode::Manual)]
    );
    assert_eq!(console.state().selections.mode, TaskMode::Manual);
    assert!(notices(&mut rx).contains(&(
        Severity::Info,
        "It is not possible to change to MDI Mode at the moment".to_string()
    )));
}

#[test]
fn test_setup_page_locks_mode() {
    let mut config = ConsoleConfig::default();
    config.traj.no_force_homing = true;
    let mut console = build(SimulatedMachine::new(3), config, Preferences::default());
    bring_up(&mut console);

    console.handle(OperatorEvent::SelectPage(Page::Setup)).unwrap();
    assert_eq!(
        console.handle(OperatorEvent::SelectMode(TaskMode::Auto)),
        Err(Rejection::SetupPageActive.into())
    );
    assert!(console.machine().commands().is_empty());
    assert_eq!(console.state().selections.mode, TaskMode::Manual);
}

#[test]
fn test_run_from_line_and_progress() {
    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("part.ngc");
    std::fs::write(&program, "G0 X0\nG1 X1 F100\nG1 Y1\nM2\n").unwrap();

    let mut config = ConsoleConfig::default();
    config.traj.no_force_homing = true;
    let prefs = Preferences {
        run_from_line: true,
        ..Default::default()
    };
    let mut sim = SimulatedMachine::new(3);
    sim.status_mut().file = Some(program);
    let mut console = build(sim, config, prefs);
    bring_up(&mut console);
    assert_eq!(console.state().program_length, 4);
    assert!(console.state().program_label.ends_with("part.ngc"));

    assert_eq!(
        console.handle(OperatorEvent::Run),
        Err(Rejection::WrongMode {
            required: TaskMode::Auto
        }
        .into())
    );
    console
        .handle(OperatorEvent::SelectMode(TaskMode::Auto))
        .unwrap();
    console.tick().unwrap();
    console.machine_mut().clear_commands();

    console.handle(OperatorEvent::RunFromLine(2)).unwrap();
    assert_eq!(console.handle(OperatorEvent::Run), Ok(Accepted::Sent));
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::Run { start_line: 2 }]
    );
    assert_eq!(console.state().restart_line, 0);

    console.tick().unwrap();
    assert_eq!(console.state().current_line, 2);
    assert_eq!(console.state().progress_text, "50.0 % Complete");
    assert!(!console.state().enablement.run_idle);
    assert_eq!(
        console.handle(OperatorEvent::Run),
        Err(Rejection::InterpreterBusy.into())
    );

    assert_eq!(console.handle(OperatorEvent::Stop), Ok(Accepted::Sent));
    console.tick().unwrap();
    assert_eq!(console.state().current_line, 0);
    assert!(console.state().enablement.run_idle);
}

#[test]
fn test_run_from_line_disabled() {
    let mut console = console();
    bring_up(&mut console);
    assert_eq!(
        console.handle(OperatorEvent::RunFromLine(10)),
        Err(Rejection::RunFromLineDisabled.into())
    );
    assert_eq!(console.state().restart_line, 0);
}

#[test]
fn test_toggle_units_round_trip() {
    let mut console = console();
    bring_up(&mut console);
    let original = console.jog().slider();

    console.handle(OperatorEvent::ToggleUnits).unwrap();
    assert!((console.state().unit_factor - 1.0 / 25.4).abs() < 1e-12);
    assert!((console.state().jog_velocity - original.value / 25.4).abs() < 1e-9);

    console.handle(OperatorEvent::ToggleUnits).unwrap();
    assert_eq!(console.state().unit_factor, 1.0);
    let restored = console.jog().slider();
    assert!((restored.value - original.value).abs() < 1e-9);
    assert!((restored.min - original.min).abs() < 1e-9);
    assert!((restored.max - original.max).abs() < 1e-9);
}

#[test]
fn test_block_delete_persists_preference() {
    let mut console = console();
    bring_up(&mut console);
    assert_eq!(
        console.handle(OperatorEvent::BlockDelete(true)),
        Ok(Accepted::Sent)
    );
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::BlockDelete(true)]
    );
    assert!(console.prefs().block_delete);
}

#[test]
fn test_ignore_limits_needs_tripped_limit() {
    let mut console = console();
    bring_up(&mut console);
    assert_eq!(
        console.handle(OperatorEvent::IgnoreLimits),
        Err(Rejection::NoLimitActive.into())
    );
    console.machine_mut().status_mut().axes[2].limit_active = true;
    console.tick().unwrap();
    assert_eq!(
        console.handle(OperatorEvent::IgnoreLimits),
        Ok(Accepted::Sent)
    );
    assert_eq!(
        console.machine().commands().last(),
        Some(&MachineCommand::OverrideLimits)
    );
}

#[test]
fn test_reload_preference_forced_off_without_homing() {
    let mut config = ConsoleConfig::default();
    config.traj.no_force_homing = true;
    let prefs = Preferences {
        reload_tool: true,
        ..Default::default()
    };
    let mut console = build(SimulatedMachine::new(3), config, prefs);
    assert!(!console.prefs().reload_tool);
    console
        .handle(OperatorEvent::Preference {
            toggle: cncconsole_control::PreferenceToggle::ReloadTool,
            enabled: true,
        })
        .unwrap();
    assert!(!console.prefs().reload_tool);
}

fn mdi_console() -> Console<SimulatedMachine> {
    let mut config = ConsoleConfig::default();
    config.traj.no_force_homing = true;
    let mut console = build(SimulatedMachine::new(3), config, Preferences::default());
    bring_up(&mut console);
    console
        .handle(OperatorEvent::SelectMode(TaskMode::Mdi))
        .unwrap();
    console.tick().unwrap();
    console.machine_mut().clear_commands();
    console
}

#[test]
fn test_coolant_toggle_tracks_machine() {
    let mut console = console();
    bring_up(&mut console);

    let flood_on = OperatorEvent::Coolant {
        coolant: Coolant::Flood,
        on: true,
    };
    assert_eq!(console.handle(flood_on.clone()), Ok(Accepted::Sent));
    assert_eq!(console.machine().commands(), &[MachineCommand::Flood(true)]);
    console.tick().unwrap();
    assert!(console.state().selections.flood);
    assert_eq!(console.handle(flood_on), Ok(Accepted::Unchanged));

    // M7 from a program shows up on the toggle without an echo
    console.machine_mut().status_mut().mist = true;
    console.tick().unwrap();
    assert!(console.state().selections.mist);
    assert_eq!(console.machine().commands().len(), 1);

    console.handle(OperatorEvent::Estop(true)).unwrap();
    console.tick().unwrap();
    assert!(!console.state().selections.flood);
    assert!(!console.state().selections.mist);
}

#[test]
fn test_go_to_zero_needs_mdi() {
    let mut console = console();
    bring_up(&mut console);
    let mut rx = console.bus().receiver();

    assert_eq!(
        console.handle(OperatorEvent::GoToZero(ZeroMove::Relative)),
        Err(Rejection::WrongMode {
            required: TaskMode::Mdi
        }
        .into())
    );
    assert_eq!(
        notices(&mut rx),
        vec![(Severity::Info, "Must be in MDI mode".to_string())]
    );
    assert!(console.machine().commands().is_empty());
}

#[test]
fn test_go_to_zero_lifts_z_first() {
    let mut console = mdi_console();
    assert_eq!(
        console.handle(OperatorEvent::GoToZero(ZeroMove::Absolute)),
        Ok(Accepted::Sent)
    );
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetMode(TaskMode::Mdi),
            MachineCommand::Mdi("G90 G53 G0 Z0".to_string()),
            MachineCommand::Mdi("G53 G0 X0 Y0".to_string()),
        ]
    );
}

#[test]
fn test_zero_g92_returns_to_manual() {
    let mut console = mdi_console();
    assert_eq!(console.handle(OperatorEvent::ZeroG92), Ok(Accepted::Sent));
    assert_eq!(
        console.machine().commands(),
        &[
            MachineCommand::SetMode(TaskMode::Mdi),
            MachineCommand::Mdi("G92.1".to_string()),
            MachineCommand::SetMode(TaskMode::Manual),
        ]
    );
    console.tick().unwrap();
    assert_eq!(console.state().selections.mode, TaskMode::Manual);
}

#[test]
fn test_touch_plate_needs_mounted_tool() {
    let mut console = mdi_console();
    assert!(!console.state().enablement.touch_off);
    assert_eq!(
        console.handle(OperatorEvent::TouchOff(TouchOffKind::TouchPlate)),
        Err(Rejection::NoToolLoaded.into())
    );
    assert_eq!(
        console.handle(OperatorEvent::TouchOff(TouchOffKind::Laser)),
        Ok(Accepted::Sent)
    );
    assert_eq!(
        console.machine().commands(),
        &[MachineCommand::Mdi("o< laserzero > call".to_string())]
    );
}

#[test]
fn test_feed_text_in_machine_units() {
    let mut console = console();
    bring_up(&mut console);
    {
        let status = console.machine_mut().status_mut();
        status.commanded_feed = 800.0;
        status.feed_override = 1.5;
        status.current_velocity = 10.0;
    }
    console.tick().unwrap();
    assert_eq!(console.state().feed, "800");
    assert_eq!(console.state().real_feed, "1200");
    assert_eq!(console.state().velocity, "600");

    // display units do not change the feed precision
    console.handle(OperatorEvent::ToggleUnits).unwrap();
    console.tick().unwrap();
    assert_eq!(console.state().feed, "800");
    assert_eq!(console.state().velocity, "23");
}
