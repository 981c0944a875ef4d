use std::sync::Arc;

use tracing::debug;

use crate::capabilities::{ComposeField, DialogWidget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogState {
    Open,
    #[default]
    Closed,
}

/// Keeps the emoji picker and the compose field in step.
pub struct PickerCoordinator {
    state: DialogState,
    dialog: Arc<dyn DialogWidget>,
    compose: Arc<dyn ComposeField>,
}

impl PickerCoordinator {
    pub fn new(dialog: Arc<dyn DialogWidget>, compose: Arc<dyn ComposeField>) -> Self {
        Self {
            state: DialogState::Closed,
            dialog,
            compose,
        }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn toggle(&mut self) {
        self.state = match self.state {
            DialogState::Open => {
                self.dialog.close();
                self.compose.focus();
                DialogState::Closed
            }
            DialogState::Closed => {
                self.dialog.show_modal();
                DialogState::Open
            }
        };
        debug!(state = ?self.state, "picker toggled");
    }

    /// Appends `glyph` to the end of the compose field and closes the picker.
    pub fn on_glyph_selected(&mut self, glyph: &str) {
        let mut value = self.compose.value();
        value.push_str(glyph);
        self.compose.set_value(value);
        self.toggle();
    }
}

#[cfg(test)]
#[path = "tests/picker_tests.rs"]
mod tests;
