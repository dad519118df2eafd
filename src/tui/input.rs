use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::tui::surface::RenderSurface;

/// Lines scrolled per mouse wheel notch
const WHEEL_LINES: usize = 3;

/// What the event loop should do after an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Nothing changed
    Ignore,
    /// Surface state changed
    Redraw,
    /// Operator asked to stop every command
    Abort,
}

/// Apply a terminal event to the surface
pub fn handle_event(surface: &mut RenderSurface, event: &Event) -> InputAction {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(surface, key),
        Event::Mouse(mouse) => handle_mouse(surface, mouse),
        Event::Resize(_, _) => InputAction::Redraw,
        _ => InputAction::Ignore,
    }
}

/// `Esc`, `q` and `Ctrl-C`
pub fn is_abort(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

fn handle_key(surface: &mut RenderSurface, key: &KeyEvent) -> InputAction {
    if is_abort(key) {
        return InputAction::Abort;
    }

    match key.code {
        KeyCode::Tab => {
            surface.focus_next();
            return InputAction::Redraw;
        }
        KeyCode::BackTab => {
            surface.focus_prev();
            return InputAction::Redraw;
        }
        _ => {}
    }

    let Some(pane) = surface.focused_pane_mut() else {
        return InputAction::Ignore;
    };
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('d') if ctrl => pane.scroll_half_page_down(),
        KeyCode::Char('u') if ctrl => pane.scroll_half_page_up(),
        KeyCode::PageDown => pane.scroll_half_page_down(),
        KeyCode::PageUp => pane.scroll_half_page_up(),
        KeyCode::Char('j') | KeyCode::Down => pane.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => pane.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => pane.scroll_to_top(),
        KeyCode::Char('G') | KeyCode::End => {
            pane.scroll_to_bottom();
            if !pane.follow() {
                pane.toggle_follow();
            }
        }
        KeyCode::Char('f') => pane.toggle_follow(),
        _ => return InputAction::Ignore,
    }
    InputAction::Redraw
}

fn handle_mouse(surface: &mut RenderSurface, mouse: &MouseEvent) -> InputAction {
    let Some(index) = surface.pane_at(mouse.column, mouse.row) else {
        return InputAction::Ignore;
    };
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => surface.focus(index),
        MouseEventKind::ScrollDown => {
            if let Some(pane) = surface.pane_mut(index) {
                pane.scroll_down(WHEEL_LINES);
            }
        }
        MouseEventKind::ScrollUp => {
            if let Some(pane) = surface.pane_mut(index) {
                pane.scroll_up(WHEEL_LINES);
            }
        }
        _ => return InputAction::Ignore,
    }
    InputAction::Redraw
}
