//! TextBlock Widget
//!
//! A borderless text region that sticks to the bottom, the way a chat log
//! reads. Scrolling is counted in lines up from the newest line.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::Line;
use ratatui::widgets::StatefulWidget;

/// State for a bottom-anchored text block
#[derive(Debug, Default)]
pub struct TextBlockState {
    /// Lines scrolled up from the bottom
    pub scroll_offset: usize,
    /// Total content lines at the last render
    pub total_lines: usize,
    /// Visible height at the last render
    pub viewport: usize,
}

impl TextBlockState {
    /// Scroll toward older lines
    pub fn scroll_up(&mut self, lines: usize) {
        let max = self.total_lines.saturating_sub(self.viewport);
        self.scroll_offset = (self.scroll_offset + lines).min(max);
    }

    /// Scroll toward newer lines
    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Jump back to the newest line
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Whether older lines are hidden above
    pub fn has_more_above(&self) -> bool {
        self.total_lines.saturating_sub(self.scroll_offset) > self.viewport
    }
}

/// A borderless, bottom-anchored block of pre-laid-out lines
pub struct TextBlock<'a> {
    lines: &'a [Line<'a>],
}

impl<'a> TextBlock<'a> {
    /// Block over already-wrapped lines
    pub fn new(lines: &'a [Line<'a>]) -> Self {
        Self { lines }
    }
}

impl StatefulWidget for TextBlock<'_> {
    type State = TextBlockState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let height = usize::from(area.height);
        state.total_lines = self.lines.len();
        state.viewport = height;

        // Clamp scroll
        let max_scroll = state.total_lines.saturating_sub(height);
        state.scroll_offset = state.scroll_offset.min(max_scroll);

        let end = state.total_lines - state.scroll_offset;
        let start = end.saturating_sub(height);

        for (row, line) in (area.y..).zip(&self.lines[start..end]) {
            buf.set_line(area.x, row, line, area.width);
        }
    }
}
