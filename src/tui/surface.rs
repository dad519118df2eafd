use ratatui::Frame;
use ratatui::layout::{Margin, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{
    Block, BorderType, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState,
};

use crate::buffer::StreamKind;
use crate::layout::GridLayout;
use crate::tui::pane::Pane;

/// Border rows and columns around a pane's log view
const BORDER: u16 = 2;

/// Terminal screen holding one pane per command in a two-column grid
///
/// The grid geometry is fixed at construction; only the cell size of each
/// pane follows the terminal size.
pub struct RenderSurface {
    layout: GridLayout,
    panes: Vec<Pane>,
    focused: usize,
    status: Option<String>,
    area: Rect,
}

impl RenderSurface {
    /// Create a surface laid out for `panes`, focusing the first one
    pub fn new(panes: Vec<Pane>) -> Self {
        Self {
            layout: GridLayout::new(panes.len()),
            panes,
            focused: 0,
            status: None,
            area: Rect::default(),
        }
    }

    /// Return the grid layout
    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Return the number of panes
    pub fn len(&self) -> usize {
        self.panes.len()
    }

    /// Check if the surface has no panes
    pub fn is_empty(&self) -> bool {
        self.panes.is_empty()
    }

    /// Get the pane at `index`
    pub fn pane(&self, index: usize) -> Option<&Pane> {
        self.panes.get(index)
    }

    /// Get the pane at `index` mutably
    pub fn pane_mut(&mut self, index: usize) -> Option<&mut Pane> {
        self.panes.get_mut(index)
    }

    /// Append a chunk to the pane at `index`
    ///
    /// Returns false when there is no such pane.
    pub fn append(&mut self, index: usize, kind: StreamKind, chunk: &str) -> bool {
        match self.panes.get_mut(index) {
            Some(pane) => {
                pane.append(kind, chunk);
                true
            }
            None => {
                tracing::warn!(index, "chunk for unknown pane dropped");
                false
            }
        }
    }

    /// Return the index of the focused pane
    pub fn focused(&self) -> usize {
        self.focused
    }

    /// Get the focused pane mutably
    pub fn focused_pane_mut(&mut self) -> Option<&mut Pane> {
        self.panes.get_mut(self.focused)
    }

    /// Focus the pane at `index`; out of range indices are ignored
    pub fn focus(&mut self, index: usize) {
        if index < self.panes.len() {
            self.focused = index;
        }
    }

    /// Focus the next pane, wrapping around
    pub fn focus_next(&mut self) {
        if !self.panes.is_empty() {
            self.focused = (self.focused + 1) % self.panes.len();
        }
    }

    /// Focus the previous pane, wrapping around
    pub fn focus_prev(&mut self) {
        if !self.panes.is_empty() {
            self.focused = self
                .focused
                .checked_sub(1)
                .unwrap_or(self.panes.len() - 1);
        }
    }

    /// Pane under the terminal cell at (`column`, `row`), as of the last render
    pub fn pane_at(&self, column: u16, row: u16) -> Option<usize> {
        self.layout.pane_at(self.area, column, row)
    }

    /// One-line message drawn over the bottom row
    pub fn set_status(&mut self, status: Option<String>) {
        self.status = status;
    }

    /// Return the status overlay text, if any
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Fit every pane's viewport to `area`
    pub fn resize(&mut self, area: Rect) {
        self.area = area;
        for (pane, rect) in self.panes.iter_mut().zip(self.layout.rects(area)) {
            pane.set_visible_lines(usize::from(rect.height.saturating_sub(BORDER)));
        }
    }

    /// Render every pane and the status overlay
    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        if area != self.area {
            self.resize(area);
        }

        for (index, (pane, rect)) in self
            .panes
            .iter()
            .zip(self.layout.rects(area))
            .enumerate()
        {
            render_pane(frame, pane, rect, index == self.focused);
        }

        if let Some(status) = &self.status
            && area.height > 0
        {
            let row = Rect::new(area.x, area.bottom() - 1, area.width, 1);
            frame.render_widget(Clear, row);
            frame.render_widget(
                Paragraph::new(status.as_str())
                    .style(Style::default().add_modifier(Modifier::REVERSED)),
                row,
            );
        }
    }
}

fn render_pane(frame: &mut Frame, pane: &Pane, rect: Rect, focused: bool) {
    let mut border_style = Style::default().fg(pane.border_color());
    if focused {
        border_style = border_style.add_modifier(Modifier::BOLD);
    }
    let block = Block::bordered()
        .border_type(if focused {
            BorderType::Thick
        } else {
            BorderType::Plain
        })
        .border_style(border_style)
        .title(pane.label());

    let lines: Vec<Line> = pane.visible().map(|line| line.to_line()).collect();
    frame.render_widget(Paragraph::new(lines).block(block), rect);

    let mut scrollbar = ScrollbarState::new(pane.buffer().len())
        .position(pane.scroll_offset())
        .viewport_content_length(pane.visible_lines());
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None),
        rect.inner(Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut scrollbar,
    );
}
