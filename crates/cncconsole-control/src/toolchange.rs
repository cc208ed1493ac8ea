//! Manual tool change
//!
//! When the mounted tool number changes the console prompts the operator
//! to swap the tool and waits for a confirmation. The prompt does not
//! block the console: it raises `pending`, and confirming clears it and
//! raises `changed`.
//!
//! The sequencer also drives the tool reload after homing. The reload is
//! an `M61` in MDI, which changes the tool number without a physical swap;
//! that change must not prompt, and once it lands the console returns to
//! manual mode.

use crate::machine::{CommandLink, MachineController};
use cncconsole_core::{ControllerError, InterpState, MachineStatus, TaskMode, ToolTable};
use serde::{Deserialize, Serialize};

/// State of the tool change prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolChangeRequest {
    /// Waiting for the operator
    pub pending: bool,
    /// Tool to mount, 0 to remove
    pub tool: u32,
    /// The program waits on the confirmation
    pub blocking: bool,
}

/// What changed when the mounted tool changed
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUpdate {
    /// Previous tool
    pub from: u32,
    /// New tool
    pub to: u32,
    /// Prompt for the operator, `None` when the change came from a reload
    pub prompt: Option<String>,
}

/// Prompt text for mounting `tool`
pub fn prompt_text(tool: u32, tools: &ToolTable) -> String {
    if tool == 0 {
        return "Please remove the mounted tool".to_string();
    }
    let mut text = format!("Please change to tool # {}", tool);
    if let Some(entry) = tools.lookup(tool) {
        if !entry.comment.is_empty() {
            text.push_str(&format!(": {}", entry.comment));
        }
        if entry.diameter > 0.0 {
            text.push_str(&format!(" (D{:.3})", entry.diameter));
        }
    }
    text
}

/// Tool change and reload sequencing
#[derive(Debug, Clone, Default)]
pub struct ToolChangeSequencer {
    request: ToolChangeRequest,
    changed: bool,
    mounted: Option<u32>,
    load_tool: bool,
    return_to_manual: bool,
}

impl ToolChangeSequencer {
    /// Idle sequencer
    pub fn new() -> Self {
        Self::default()
    }

    /// Current prompt state
    pub fn request(&self) -> ToolChangeRequest {
        self.request
    }

    /// The last prompt was confirmed
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// A reload MDI is in flight
    pub fn reload_in_flight(&self) -> bool {
        self.load_tool
    }

    /// Prompt pending or reload in flight; run controls stay locked
    pub fn is_busy(&self) -> bool {
        self.request.pending || self.load_tool
    }

    /// Anything under way, including a deferred return to manual
    pub fn is_active(&self) -> bool {
        self.is_busy() || self.return_to_manual
    }

    /// Re-mount `tool` with `M61` after homing.
    ///
    /// Returns `false` without sending anything for tool 0.
    pub fn begin_reload(
        &mut self,
        tool: u32,
        link: &mut CommandLink<'_>,
    ) -> Result<bool, ControllerError> {
        if tool == 0 {
            return Ok(false);
        }
        tracing::info!("Reloading tool {}", tool);
        self.load_tool = true;
        self.return_to_manual = true;
        link.set_mode_and_wait(TaskMode::Mdi)?;
        link.mdi_and_wait(&format!("M61 Q{} G43", tool))?;
        Ok(true)
    }

    /// Feed a status snapshot.
    ///
    /// Returns the tool change, if any. A change that completes a reload
    /// carries no prompt. With G43 active outside auto mode the tool length
    /// offset is re-applied for the new tool.
    pub fn observe(
        &mut self,
        status: &MachineStatus,
        tools: &ToolTable,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<Option<ToolUpdate>, ControllerError> {
        let tool = status.tool_in_spindle;
        let Some(from) = self.mounted.replace(tool) else {
            return Ok(None);
        };
        if from == tool {
            return Ok(None);
        }

        if self.load_tool {
            tracing::debug!("Reload of tool {} complete", tool);
            self.load_tool = false;
            return Ok(Some(ToolUpdate {
                from,
                to: tool,
                prompt: None,
            }));
        }

        let prompt = prompt_text(tool, tools);
        tracing::info!("Tool change T{} -> T{}", from, tool);
        self.request = ToolChangeRequest {
            pending: true,
            tool,
            blocking: true,
        };
        self.changed = false;

        if commands_allowed && status.has_gcode("G43") && status.task_mode != TaskMode::Auto {
            link.set_mode_and_wait(TaskMode::Mdi)?;
            link.mdi_and_wait("G43")?;
        }

        Ok(Some(ToolUpdate {
            from,
            to: tool,
            prompt: Some(prompt),
        }))
    }

    /// Operator confirmed the prompt; returns the confirmed tool
    pub fn confirm(&mut self) -> Option<u32> {
        if !self.request.pending {
            return None;
        }
        self.request.pending = false;
        self.changed = true;
        Some(self.request.tool)
    }

    /// Return to manual mode once nothing else is holding it back.
    ///
    /// Waits for the reload to land, the prompt to be confirmed and the
    /// interpreter to go idle. Returns whether the mode was switched.
    pub fn resume(
        &mut self,
        status: &MachineStatus,
        commands_allowed: bool,
        link: &mut CommandLink<'_>,
    ) -> Result<bool, ControllerError> {
        if !self.return_to_manual
            || self.is_busy()
            || !commands_allowed
            || !status.is_on()
            || status.interp_state != InterpState::Idle
        {
            return Ok(false);
        }
        self.return_to_manual = false;
        link.set_mode_and_wait(TaskMode::Manual)?;
        Ok(true)
    }

    /// Drop the prompt and any reload, as estop does
    pub fn cancel(&mut self) {
        if self.is_active() {
            tracing::info!("Tool change sequence cancelled");
        }
        self.request.pending = false;
        self.load_tool = false;
        self.return_to_manual = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::MachineCommand;
    use crate::sim::SimulatedMachine;
    use cncconsole_core::{EventBus, ToolEntry};

    fn table() -> ToolTable {
        let mut tools = ToolTable::new();
        tools.insert(ToolEntry::new(7, 7, 6.0).with_comment("6mm end mill"));
        tools
    }

    fn on_machine(tool: u32) -> SimulatedMachine {
        let mut sim = SimulatedMachine::new(3);
        sim.power_on();
        sim.status_mut().tool_in_spindle = tool;
        sim
    }

    fn observe(
        seq: &mut ToolChangeSequencer,
        sim: &mut SimulatedMachine,
        bus: &EventBus,
    ) -> Option<ToolUpdate> {
        let status = sim.status().clone();
        let mut link = CommandLink::new(sim, bus);
        seq.observe(&status, &table(), true, &mut link).unwrap()
    }

    #[test]
    fn test_prompt_text() {
        assert_eq!(prompt_text(0, &table()), "Please remove the mounted tool");
        assert_eq!(
            prompt_text(7, &table()),
            "Please change to tool # 7: 6mm end mill (D6.000)"
        );
        assert_eq!(prompt_text(9, &table()), "Please change to tool # 9");
    }

    #[test]
    fn test_change_prompts_and_confirm() {
        let bus = EventBus::new();
        let mut sim = on_machine(3);
        let mut seq = ToolChangeSequencer::new();
        assert_eq!(observe(&mut seq, &mut sim, &bus), None);

        sim.status_mut().tool_in_spindle = 7;
        let update = observe(&mut seq, &mut sim, &bus).unwrap();
        assert_eq!(update.from, 3);
        assert!(update.prompt.unwrap().starts_with("Please change to tool # 7"));
        assert!(seq.request().pending);
        assert_eq!(seq.request().tool, 7);
        assert!(!seq.changed());

        assert_eq!(seq.confirm(), Some(7));
        assert!(!seq.request().pending);
        assert!(seq.changed());
        assert_eq!(seq.confirm(), None);
    }

    #[test]
    fn test_g43_reapplied_outside_auto() {
        let bus = EventBus::new();
        let mut sim = on_machine(3);
        sim.status_mut().gcodes.push("G43".to_string());
        let mut seq = ToolChangeSequencer::new();
        observe(&mut seq, &mut sim, &bus);
        sim.status_mut().tool_in_spindle = 4;
        observe(&mut seq, &mut sim, &bus);
        assert_eq!(
            sim.commands(),
            &[
                MachineCommand::SetMode(TaskMode::Mdi),
                MachineCommand::Mdi("G43".to_string())
            ]
        );
    }

    #[test]
    fn test_reload_does_not_prompt_and_returns_to_manual() {
        let bus = EventBus::new();
        let mut sim = on_machine(0);
        let mut seq = ToolChangeSequencer::new();
        observe(&mut seq, &mut sim, &bus);

        {
            let mut link = CommandLink::new(&mut sim, &bus);
            assert!(seq.begin_reload(5, &mut link).unwrap());
        }
        assert!(seq.is_busy());
        assert_eq!(sim.status().tool_in_spindle, 5);

        let update = observe(&mut seq, &mut sim, &bus).unwrap();
        assert_eq!(update.prompt, None);
        assert!(!seq.is_busy());

        let status = sim.status().clone();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert!(seq.resume(&status, true, &mut link).unwrap());
        assert!(!seq.resume(&status, true, &mut link).unwrap());
        drop(link);
        assert_eq!(
            sim.commands().last(),
            Some(&MachineCommand::SetMode(TaskMode::Manual))
        );
    }

    #[test]
    fn test_reload_of_tool_zero_is_skipped() {
        let bus = EventBus::new();
        let mut sim = on_machine(0);
        let mut seq = ToolChangeSequencer::new();
        let mut link = CommandLink::new(&mut sim, &bus);
        assert!(!seq.begin_reload(0, &mut link).unwrap());
        drop(link);
        assert!(sim.commands().is_empty());
    }

    #[test]
    fn test_cancel_clears_everything() {
        let bus = EventBus::new();
        let mut sim = on_machine(1);
        let mut seq = ToolChangeSequencer::new();
        observe(&mut seq, &mut sim, &bus);
        sim.status_mut().tool_in_spindle = 2;
        observe(&mut seq, &mut sim, &bus);
        assert!(seq.is_active());
        seq.cancel();
        assert!(!seq.is_active());
        assert!(!seq.request().pending);
    }
}
