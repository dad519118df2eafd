mod input;
mod pane;
mod surface;
mod terminal;

pub use input::{InputAction, handle_event, is_abort};
pub use pane::Pane;
pub use surface::RenderSurface;
pub use terminal::{Tui, init_terminal, restore_terminal};
