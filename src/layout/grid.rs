use ratatui::layout::{Position, Rect};

/// Number of grid columns
pub const COLUMNS: usize = 2;

/// Horizontal placement of a pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneSpan {
    Left,
    Right,
    /// Last pane of an odd count, alone on its row
    Full,
}

/// Position of one pane, expressed in percent of the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaneGeometry {
    pub index: usize,
    pub row: usize,
    pub rows: usize,
    pub span: PaneSpan,
}

impl PaneGeometry {
    /// Left edge as a percentage of the grid width
    pub fn left_percent(&self) -> f64 {
        match self.span {
            PaneSpan::Right => 50.0,
            PaneSpan::Left | PaneSpan::Full => 0.0,
        }
    }

    /// Width as a percentage of the grid width
    pub fn width_percent(&self) -> f64 {
        match self.span {
            PaneSpan::Full => 100.0,
            PaneSpan::Left | PaneSpan::Right => 50.0,
        }
    }

    /// Height as a percentage of the grid height
    pub fn height_percent(&self) -> f64 {
        100.0 / self.rows as f64
    }

    /// Top edge as a percentage of the grid height
    pub fn top_percent(&self) -> f64 {
        self.row as f64 * self.height_percent()
    }

    /// Cell rectangle of this pane inside `area`
    ///
    /// Row and column edges are computed from the same integer split for
    /// every pane, so neighbouring panes never overlap or leave gaps.
    pub fn rect(&self, area: Rect) -> Rect {
        let rows = self.rows.max(1) as u32;
        let height = u32::from(area.height);
        let top = (height * self.row as u32 / rows) as u16;
        let bottom = (height * (self.row as u32 + 1) / rows) as u16;

        let half = area.width / 2;
        let (x, width) = match self.span {
            PaneSpan::Left => (0, half),
            PaneSpan::Right => (half, area.width - half),
            PaneSpan::Full => (0, area.width),
        };

        Rect::new(area.x + x, area.y + top, width, bottom - top)
    }
}

/// Two-column grid for a fixed number of panes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridLayout {
    rows: usize,
    panes: Vec<PaneGeometry>,
}

impl GridLayout {
    /// Create the layout for `count` panes
    pub fn new(count: usize) -> Self {
        let rows = count.div_ceil(COLUMNS);
        let panes = (0..count)
            .map(|index| {
                let span = if count % COLUMNS != 0 && index + 1 == count {
                    PaneSpan::Full
                } else if index % COLUMNS == 0 {
                    PaneSpan::Left
                } else {
                    PaneSpan::Right
                };
                PaneGeometry {
                    index,
                    row: index / COLUMNS,
                    rows,
                    span,
                }
            })
            .collect();
        Self { rows, panes }
    }

    /// Return the number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Return the number of panes
    pub fn len(&self) -> usize {
        self.panes.len()
    }

    /// Check if the layout has no panes
    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    /// Return the geometry of every pane, in command order
    pub fn panes(&self) -> &[PaneGeometry] {
        &self.panes
    }

    /// Split `area` into one rectangle per pane
    pub fn rects(&self, area: Rect) -> Vec<Rect> {
        self.panes.iter().map(|pane| pane.rect(area)).collect()
    }

    /// Index of the pane containing the cell at (`column`, `row`)
    pub fn pane_at(&self, area: Rect, column: u16, row: u16) -> Option<usize> {
        let position = Position::new(column, row);
        self.panes
            .iter()
            .position(|pane| pane.rect(area).contains(position))
    }
}
