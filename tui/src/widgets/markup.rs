//! Markup Lines
//!
//! Lays out rendered answer [`Markup`] as styled terminal lines. Wrapping is
//! by display width so Hangul and other wide characters never overflow.

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthChar;

use manual_conductor::{Block, Markup, Span as MarkupSpan, SpanStyle};

use crate::theme;

/// Lay out `markup` into lines no wider than `width` columns
pub fn markup_lines(markup: &Markup, width: usize, base: Style) -> Vec<Line<'static>> {
    let width = width.max(8);
    let mut lines = Vec::new();

    for (i, block) in markup.blocks.iter().enumerate() {
        // Consecutive list items stay together
        let tight = i > 0
            && matches!(block, Block::ListItem { .. })
            && matches!(markup.blocks[i - 1], Block::ListItem { .. });
        if i > 0 && !tight {
            lines.push(Line::default());
        }

        match block {
            Block::Heading { spans, .. } => {
                let style = base.fg(theme::ACCENT_BLUE).add_modifier(Modifier::BOLD);
                lines.extend(wrap_spans(spans, width, "", "", style));
            }
            Block::Paragraph { spans } => {
                lines.extend(wrap_spans(spans, width, "", "", base));
            }
            Block::ListItem {
                depth,
                marker,
                spans,
            } => {
                let indent = "  ".repeat(*depth);
                let first = format!("{indent}{} ", marker.prefix());
                let rest = " ".repeat(display_width(&first));
                lines.extend(wrap_spans(spans, width, &first, &rest, base));
            }
            Block::CodeBlock { text, .. } => {
                let style = Style::default().fg(theme::CODE_ORANGE);
                for code_line in text.lines() {
                    let span = MarkupSpan::plain(code_line);
                    lines.extend(wrap_spans(
                        std::slice::from_ref(&span),
                        width,
                        "│ ",
                        "│ ",
                        style,
                    ));
                }
            }
            Block::Quote { spans } => {
                let style = base.add_modifier(Modifier::ITALIC);
                lines.extend(wrap_spans(spans, width, "▎ ", "▎ ", style));
            }
            Block::Rule => {
                lines.push(Line::styled("─".repeat(width), theme::dim()));
            }
        }
    }

    lines
}

/// Style for one inline span on top of `base`
pub fn span_style(style: SpanStyle, base: Style) -> Style {
    let mut out = base;
    if style.strong {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.emphasis {
        out = out.add_modifier(Modifier::ITALIC);
    }
    if style.strikethrough {
        out = out.add_modifier(Modifier::CROSSED_OUT);
    }
    if style.code {
        out = out.fg(theme::CODE_ORANGE);
    }
    if style.link {
        out = out.fg(theme::LINK_BLUE).add_modifier(Modifier::UNDERLINED);
    }
    out
}

/// Columns `text` occupies
pub fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Greedy character wrap of styled spans with a first-line and hanging prefix
fn wrap_spans(
    spans: &[MarkupSpan],
    width: usize,
    first_prefix: &str,
    rest_prefix: &str,
    base: Style,
) -> Vec<Line<'static>> {
    let mut wrapper = Wrapper::new(width, first_prefix, rest_prefix, base);
    for span in spans {
        wrapper.push(&span.text, span_style(span.style, base));
    }
    wrapper.finish()
}

struct Wrapper {
    width: usize,
    rest_prefix: String,
    prefix_style: Style,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    run: String,
    run_style: Style,
    used: usize,
    prefix_width: usize,
}

impl Wrapper {
    fn new(width: usize, first_prefix: &str, rest_prefix: &str, base: Style) -> Self {
        let mut wrapper = Self {
            width,
            rest_prefix: rest_prefix.to_string(),
            prefix_style: base,
            lines: Vec::new(),
            current: Vec::new(),
            run: String::new(),
            run_style: base,
            used: 0,
            prefix_width: 0,
        };
        wrapper.start_line(first_prefix);
        wrapper
    }

    fn start_line(&mut self, prefix: &str) {
        if !prefix.is_empty() {
            self.current
                .push(Span::styled(prefix.to_string(), self.prefix_style));
        }
        self.prefix_width = display_width(prefix);
        self.used = self.prefix_width;
    }

    fn push(&mut self, text: &str, style: Style) {
        if style != self.run_style {
            self.flush_run();
            self.run_style = style;
        }
        for c in text.chars() {
            if c == '\n' {
                self.break_line();
                continue;
            }
            let w = c.width().unwrap_or(0);
            if self.used + w > self.width && self.used > self.prefix_width {
                self.break_line();
                if c == ' ' {
                    continue;
                }
            }
            self.run.push(c);
            self.used += w;
        }
    }

    fn flush_run(&mut self) {
        if !self.run.is_empty() {
            self.current
                .push(Span::styled(std::mem::take(&mut self.run), self.run_style));
        }
    }

    fn break_line(&mut self) {
        self.flush_run();
        self.lines
            .push(Line::from(std::mem::take(&mut self.current)));
        let prefix = self.rest_prefix.clone();
        self.start_line(&prefix);
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_run();
        if !self.current.is_empty() || self.lines.is_empty() {
            self.lines.push(Line::from(self.current));
        }
        self.lines
    }
}
