//! Key-bound session commands

use crate::app::config::KeyBindingsConfig;
use crate::graph::WidgetAction;

/// Keys the session reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Escape,
}

/// What a key press asks the session to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Choose the action recorded by the next capture
    SelectAction(WidgetAction),
    /// Replay everything from the current state
    PerformWidgets,
    Home,
    PreviousState,
    NextState,
    /// Re-record the located widget under the pointer
    ForceRepair,
    /// Delete the selected widget under the pointer and its subtree
    DeleteAtPointer,
    /// Abandon a pending repair, menu action or type action
    Cancel,
}

/// Control-key map built from the configured bindings
#[derive(Debug, Clone)]
pub struct KeyMap {
    bindings: Vec<(char, Command)>,
}

impl KeyMap {
    pub fn new(keys: &KeyBindingsConfig) -> Self {
        let bindings = vec![
            (keys.left_click, Command::SelectAction(WidgetAction::LeftClick)),
            (keys.right_click, Command::SelectAction(WidgetAction::RightClick)),
            (keys.double_click, Command::SelectAction(WidgetAction::DoubleClick)),
            (keys.type_action, Command::SelectAction(WidgetAction::pending_type())),
            (keys.check, Command::SelectAction(WidgetAction::Check)),
            (keys.menu_action, Command::SelectAction(WidgetAction::pending_menu())),
            (keys.perform_widgets, Command::PerformWidgets),
            (keys.home, Command::Home),
            (keys.previous_state, Command::PreviousState),
            (keys.next_state, Command::NextState),
            (keys.force_repair, Command::ForceRepair),
        ];
        Self {
            bindings: bindings
                .into_iter()
                .map(|(key, command)| (key.to_ascii_uppercase(), command))
                .collect(),
        }
    }

    /// Command bound to `key` while Control is held
    pub fn command_for(&self, key: Key) -> Option<Command> {
        match key {
            Key::Backspace => Some(Command::DeleteAtPointer),
            Key::Escape => Some(Command::Cancel),
            Key::Char(ch) => {
                let ch = ch.to_ascii_uppercase();
                self.bindings
                    .iter()
                    .find(|(bound, _)| *bound == ch)
                    .map(|(_, command)| command.clone())
            }
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(&KeyBindingsConfig::default())
    }
}
