mod grid;

pub use grid::{COLUMNS, GridLayout, PaneGeometry, PaneSpan};
