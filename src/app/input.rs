use glam::Vec2;
use winit::event::MouseButton;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Orbit,
    Pan,
}

impl DragMode {
    fn for_button(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(Self::Orbit),
            MouseButton::Right | MouseButton::Middle => Some(Self::Pan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    None,
    /// Left press in the viewport: pick under the cursor.
    Select(Vec2),
    Drag { mode: DragMode, delta: Vec2 },
    Hover(Vec2),
}

/// Pointer state for the 3D viewport. Positions are physical pixels.
#[derive(Default, Debug, Clone, Copy)]
pub struct InputState {
    cursor: Option<Vec2>,
    drag: Option<DragMode>,
}

impl InputState {
    pub fn handle_cursor_moved(&mut self, position: Vec2) -> InputAction {
        let previous = self.cursor.replace(position);
        match (self.drag, previous) {
            (Some(mode), Some(previous)) => InputAction::Drag {
                mode,
                delta: position - previous,
            },
            (Some(_), None) => InputAction::None,
            (None, _) => InputAction::Hover(position),
        }
    }

    pub fn handle_cursor_left(&mut self) {
        self.cursor = None;
    }

    /// `over_ui` presses start nothing in the viewport; releases always end a drag.
    pub fn handle_button(&mut self, button: MouseButton, pressed: bool, over_ui: bool) -> InputAction {
        let Some(mode) = DragMode::for_button(button) else {
            return InputAction::None;
        };
        if !pressed {
            if self.drag == Some(mode) {
                self.drag = None;
            }
            return InputAction::None;
        }
        if over_ui || self.drag.is_some() {
            return InputAction::None;
        }
        self.drag = Some(mode);
        match (mode, self.cursor) {
            (DragMode::Orbit, Some(cursor)) => InputAction::Select(cursor),
            _ => InputAction::None,
        }
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_press_selects_then_drags() {
        let mut input = InputState::default();
        assert_eq!(
            input.handle_cursor_moved(Vec2::new(10.0, 10.0)),
            InputAction::Hover(Vec2::new(10.0, 10.0))
        );
        assert_eq!(
            input.handle_button(MouseButton::Left, true, false),
            InputAction::Select(Vec2::new(10.0, 10.0))
        );
        assert_eq!(
            input.handle_cursor_moved(Vec2::new(14.0, 7.0)),
            InputAction::Drag {
                mode: DragMode::Orbit,
                delta: Vec2::new(4.0, -3.0)
            }
        );
        input.handle_button(MouseButton::Left, false, false);
        assert_eq!(
            input.handle_cursor_moved(Vec2::new(15.0, 7.0)),
            InputAction::Hover(Vec2::new(15.0, 7.0))
        );
    }

    #[test]
    fn presses_over_ui_are_ignored() {
        let mut input = InputState::default();
        input.handle_cursor_moved(Vec2::ZERO);
        assert_eq!(input.handle_button(MouseButton::Left, true, true), InputAction::None);
        assert_eq!(input.handle_cursor_moved(Vec2::X), InputAction::Hover(Vec2::X));
    }

    #[test]
    fn right_drag_pans_and_ignores_other_releases() {
        let mut input = InputState::default();
        input.handle_cursor_moved(Vec2::ZERO);
        assert_eq!(input.handle_button(MouseButton::Right, true, false), InputAction::None);
        input.handle_button(MouseButton::Left, false, false);
        assert!(matches!(
            input.handle_cursor_moved(Vec2::X),
            InputAction::Drag {
                mode: DragMode::Pan,
                ..
            }
        ));
    }
}
