use ratatui::style::Color;

use crate::buffer::{LogBuffer, OutputLine, StreamKind};

/// Bordered, independently scrollable log view for one command
pub struct Pane {
    label: String,
    border_color: Color,
    buffer: LogBuffer,
    scroll_offset: usize,
    follow: bool,
    visible_lines: usize,
}

impl Pane {
    /// Create an empty pane that follows its tail
    pub fn new(label: String, border_color: Color, max_lines: usize) -> Self {
        Self {
            label,
            border_color,
            buffer: LogBuffer::new(max_lines),
            scroll_offset: 0,
            follow: true,
            visible_lines: 0,
        }
    }

    /// Return the pane title
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Return the border color
    pub fn border_color(&self) -> Color {
        self.border_color
    }

    /// Return the buffered output
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Append a chunk and keep the tail in view when following
    pub fn append(&mut self, kind: StreamKind, chunk: &str) {
        let before = self.buffer.len();
        let added = self.buffer.push_chunk(kind, chunk);
        if self.follow {
            self.scroll_to_bottom();
        } else {
            // lines dropped from the front move the viewed lines up
            let dropped = (before + added).saturating_sub(self.buffer.len());
            self.scroll_offset = self
                .scroll_offset
                .saturating_sub(dropped)
                .min(self.max_scroll_offset());
        }
    }

    /// Lines currently in view
    pub fn visible(&self) -> impl Iterator<Item = &OutputLine> {
        self.buffer.window(self.scroll_offset, self.visible_lines)
    }

    /// Update the viewport height, e.g. after a resize
    pub fn set_visible_lines(&mut self, lines: usize) {
        self.visible_lines = lines;
        if self.follow {
            self.scroll_to_bottom();
        } else {
            self.scroll_offset = self.scroll_offset.min(self.max_scroll_offset());
        }
    }

    /// Return the viewport height in lines
    pub fn visible_lines(&self) -> usize {
        self.visible_lines
    }

    /// Return the index of the first visible line
    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Check if the pane follows new output
    pub fn follow(&self) -> bool {
        self.follow
    }

    /// Toggle following new output
    pub fn toggle_follow(&mut self) {
        self.follow = !self.follow;
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    /// Scroll down by `lines`
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = (self.scroll_offset + lines).min(self.max_scroll_offset());
        self.follow = self.at_bottom();
    }

    /// Scroll up by `lines`
    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
        self.follow = self.at_bottom();
    }

    /// Scroll down by half a page
    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.visible_lines / 2).max(1));
    }

    /// Scroll up by half a page
    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.visible_lines / 2).max(1));
    }

    /// Scroll to the first line
    pub fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
        self.follow = self.at_bottom();
    }

    /// Scroll to the last line
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = self.max_scroll_offset();
    }

    fn at_bottom(&self) -> bool {
        self.scroll_offset >= self.max_scroll_offset()
    }

    fn max_scroll_offset(&self) -> usize {
        self.buffer.len().saturating_sub(self.visible_lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pane_with_lines(count: usize, visible: usize) -> Pane {
        let mut pane = Pane::new("[test]".into(), Color::Cyan, 100);
        pane.set_visible_lines(visible);
        for i in 0..count {
            pane.append(StreamKind::Stdout, &format!("line{i}"));
        }
        pane
    }

    fn visible_text(pane: &Pane) -> Vec<String> {
        pane.visible().map(OutputLine::plain).collect()
    }

    #[test]
    fn pane_append_follows_tail() {
        let pane = pane_with_lines(20, 5);

        assert!(pane.follow());
        assert_eq!(pane.scroll_offset(), 15);
        assert_eq!(
            visible_text(&pane),
            vec!["line15", "line16", "line17", "line18", "line19"]
        );
    }

    #[test]
    fn pane_scroll_up_stops_following() {
        let mut pane = pane_with_lines(20, 5);

        pane.scroll_up(1);
        pane.append(StreamKind::Stdout, "line20");

        assert!(!pane.follow());
        assert_eq!(pane.scroll_offset(), 14);
    }

    #[test]
    fn pane_scroll_down_to_bottom_resumes_following() {
        let mut pane = pane_with_lines(20, 5);
        pane.scroll_up(3);

        pane.scroll_down(10);

        assert!(pane.follow());
        assert_eq!(pane.scroll_offset(), 15);
    }

    #[test]
    fn pane_scroll_up_stops_at_zero() {
        let mut pane = pane_with_lines(10, 5);
        pane.scroll_to_top();

        pane.scroll_up(1);
        assert_eq!(pane.scroll_offset(), 0);
    }

    #[rstest]
    #[case(20, 15)]
    #[case(13, 8)]
    #[case(2, 5)]
    fn pane_half_page_scroll_moves_by_half_viewport(#[case] start: usize, #[case] expected: usize) {
        let mut pane = pane_with_lines(50, 10);
        pane.scroll_to_top();
        pane.scroll_down(start);

        pane.scroll_half_page_up();
        pane.scroll_half_page_up();
        pane.scroll_half_page_down();

        assert_eq!(pane.scroll_offset(), expected);
    }

    #[test]
    fn pane_toggle_follow_jumps_to_bottom() {
        let mut pane = pane_with_lines(20, 5);
        pane.scroll_to_top();
        assert!(!pane.follow());

        pane.toggle_follow();

        assert!(pane.follow());
        assert_eq!(pane.scroll_offset(), 15);
    }

    #[test]
    fn pane_view_stays_on_same_lines_when_buffer_drops_lines() {
        let mut pane = Pane::new("[x]".into(), Color::Red, 10);
        pane.set_visible_lines(4);
        for i in 0..10 {
            pane.append(StreamKind::Stdout, &format!("line{i}"));
        }
        pane.scroll_up(2);
        assert_eq!(pane.scroll_offset(), 4);

        pane.append(StreamKind::Stderr, "overflow");

        assert_eq!(pane.buffer().len(), 10);
        assert_eq!(pane.scroll_offset(), 3);
        assert_eq!(visible_text(&pane)[0], "line4");

        pane.append(StreamKind::Stdout, "a\nb\nc\nd");

        assert_eq!(pane.scroll_offset(), 0);
        assert_eq!(visible_text(&pane)[0], "line5");
        assert!(!pane.follow());
    }
}
