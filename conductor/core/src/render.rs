//! Answer Rendering
//!
//! Converts a bot answer's markdown into [`Markup`], a small block model of
//! styled text that any surface can draw.
//!
//! # Design Philosophy
//!
//! Rendering is a pure function of the answer text. The markdown comes from
//! the backend and is not trusted: raw HTML is never passed through, it shows
//! up as the literal characters the backend sent. Everything a surface gets
//! out of [`render`] is already safe to display, and [`Markup::to_html`]
//! escapes every piece of text it emits.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

/// Inline style flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct SpanStyle {
    /// `**bold**`
    pub strong: bool,
    /// `*italic*`
    pub emphasis: bool,
    /// `` `code` ``
    pub code: bool,
    /// `~~struck~~`
    pub strikethrough: bool,
    /// Link text
    pub link: bool,
}

/// A run of text with one style
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// The text
    pub text: String,
    /// How to draw it
    pub style: SpanStyle,
}

impl Span {
    /// Unstyled text
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: SpanStyle::default(),
        }
    }
}

/// Bullet of a list item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListMarker {
    /// Unordered item
    Bullet,
    /// Ordered item with its number
    Ordered(u64),
    /// Task item, checked or not
    Task(bool),
}

impl ListMarker {
    /// Text drawn before the item
    #[must_use]
    pub fn prefix(&self) -> String {
        match self {
            Self::Bullet => "•".to_string(),
            Self::Ordered(n) => format!("{n}."),
            Self::Task(true) => "[x]".to_string(),
            Self::Task(false) => "[ ]".to_string(),
        }
    }
}

/// A block of rendered content
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    /// `#` heading
    Heading {
        /// 1 through 6
        level: u8,
        /// Heading text
        spans: Vec<Span>,
    },
    /// Paragraph of text
    Paragraph {
        /// Paragraph text
        spans: Vec<Span>,
    },
    /// One list item (nested lists produce deeper items)
    ListItem {
        /// Nesting depth, 0 for top level
        depth: usize,
        /// Bullet, number, or checkbox
        marker: ListMarker,
        /// Item text
        spans: Vec<Span>,
    },
    /// Fenced or indented code
    CodeBlock {
        /// Info string language, if any
        language: Option<String>,
        /// Code text, verbatim
        text: String,
    },
    /// Block quote paragraph
    Quote {
        /// Quoted text
        spans: Vec<Span>,
    },
    /// Horizontal rule
    Rule,
}

/// Sanitized display markup for one answer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markup {
    /// Blocks in document order
    pub blocks: Vec<Block>,
}

/// Render markdown answer text into display markup
#[must_use]
pub fn render(markdown: &str) -> Markup {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_TABLES);

    let mut builder = MarkupBuilder::default();
    for event in Parser::new_ext(markdown, options) {
        builder.event(event);
    }
    builder.finish()
}

#[derive(Default)]
struct MarkupBuilder {
    blocks: Vec<Block>,
    spans: Vec<Span>,
    strong: usize,
    emphasis: usize,
    strikethrough: usize,
    link: usize,
    link_urls: Vec<String>,
    heading: Option<u8>,
    quote_depth: usize,
    /// Next number per open list; `None` for unordered
    lists: Vec<Option<u64>>,
    item_marker: Option<ListMarker>,
    code: Option<(Option<String>, String)>,
}

impl MarkupBuilder {
    fn event(&mut self, event: Event<'_>) {
        if let Some((_, text)) = self.code.as_mut() {
            match event {
                Event::Text(t) | Event::Html(t) => {
                    text.push_str(&t);
                    return;
                }
                Event::End(TagEnd::CodeBlock { .. }) => {}
                _ => return,
            }
        }

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                self.push_text(&text, self.style());
            }
            Event::Code(code) => {
                let style = SpanStyle {
                    code: true,
                    ..self.style()
                };
                self.push_text(&code, style);
            }
            Event::SoftBreak => self.push_text(" ", self.style()),
            Event::HardBreak => self.push_text("\n", self.style()),
            Event::Rule => {
                self.flush();
                self.blocks.push(Block::Rule);
            }
            Event::TaskListMarker(checked) => {
                self.item_marker = Some(ListMarker::Task(checked));
            }
            Event::FootnoteReference(label) => {
                self.push_text(&format!("[{label}]"), self.style());
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(level as u8);
            }
            Tag::BlockQuote { .. } => {
                self.flush();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::List(start) => {
                // A nested list ends the text of its parent item
                self.flush();
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = ListMarker::Ordered(*n);
                        *n += 1;
                        marker
                    }
                    _ => ListMarker::Bullet,
                };
                self.item_marker = Some(marker);
            }
            Tag::Paragraph => {
                if self.item_marker.is_some() && !self.spans.is_empty() {
                    self.push_text(" ", SpanStyle::default());
                }
            }
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strong => self.strong += 1,
            Tag::Strikethrough => self.strikethrough += 1,
            Tag::Link { dest_url, .. } => {
                self.link += 1;
                self.link_urls.push(dest_url.to_string());
            }
            Tag::Image { dest_url, .. } => {
                self.push_text(&format!("[이미지: {dest_url}] "), self.style());
            }
            Tag::TableCell => {
                if !self.spans.is_empty() {
                    self.push_text(" | ", SpanStyle::default());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading { .. } => {
                let level = self.heading.take().unwrap_or(1);
                let spans = std::mem::take(&mut self.spans);
                if !spans.is_empty() {
                    self.blocks.push(Block::Heading { level, spans });
                }
            }
            TagEnd::Paragraph => {
                if self.item_marker.is_none() {
                    self.flush();
                }
            }
            TagEnd::BlockQuote { .. } => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            TagEnd::CodeBlock { .. } => {
                if let Some((language, text)) = self.code.take() {
                    self.blocks.push(Block::CodeBlock {
                        language,
                        text: text.trim_end_matches('\n').to_string(),
                    });
                }
            }
            TagEnd::List { .. } => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => {
                self.flush();
                self.item_marker = None;
            }
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Strikethrough => {
                self.strikethrough = self.strikethrough.saturating_sub(1);
            }
            TagEnd::Link { .. } => {
                self.link = self.link.saturating_sub(1);
                if let Some(url) = self.link_urls.pop() {
                    let shown = self.spans.last().is_some_and(|s| s.text.ends_with(&url));
                    if !shown && !url.is_empty() {
                        self.push_text(&format!(" ({url})"), SpanStyle::default());
                    }
                }
            }
            TagEnd::HtmlBlock { .. } | TagEnd::TableHead { .. } | TagEnd::TableRow { .. } => {
                self.flush();
            }
            _ => {}
        }
    }

    fn style(&self) -> SpanStyle {
        SpanStyle {
            strong: self.strong > 0 || self.heading.is_some(),
            emphasis: self.emphasis > 0,
            code: false,
            strikethrough: self.strikethrough > 0,
            link: self.link > 0,
        }
    }

    fn push_text(&mut self, text: &str, style: SpanStyle) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(Span {
                text: text.to_string(),
                style,
            }),
        }
    }

    /// Close the text collected so far into a block for the current context
    fn flush(&mut self) {
        let mut spans = std::mem::take(&mut self.spans);
        if let Some(last) = spans.last_mut() {
            let trimmed = last.text.trim_end_matches('\n').len();
            last.text.truncate(trimmed);
        }
        spans.retain(|s| !s.text.is_empty());
        if spans.iter().all(|s| s.text.trim().is_empty()) {
            return;
        }

        let block = if let Some(marker) = self.item_marker {
            Block::ListItem {
                depth: self.lists.len().saturating_sub(1),
                marker,
                spans,
            }
        } else if self.quote_depth > 0 {
            Block::Quote { spans }
        } else {
            Block::Paragraph { spans }
        };
        self.blocks.push(block);
    }

    fn finish(mut self) -> Markup {
        if let Some((language, text)) = self.code.take() {
            self.blocks.push(Block::CodeBlock { language, text });
        }
        self.flush();
        Markup {
            blocks: self.blocks,
        }
    }
}

impl Markup {
    /// Whether there is nothing to show
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Flatten to plain text, one line per block
    #[must_use]
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let line = match block {
                Block::Heading { spans, .. } | Block::Paragraph { spans } => join(spans),
                Block::ListItem {
                    depth,
                    marker,
                    spans,
                } => format!("{}{} {}", "  ".repeat(*depth), marker.prefix(), join(spans)),
                Block::CodeBlock { text, .. } => text.clone(),
                Block::Quote { spans } => format!("> {}", join(spans)),
                Block::Rule => "---".to_string(),
            };
            lines.push(line);
        }
        lines.join("\n")
    }

    /// Emit HTML with every piece of text escaped
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let mut in_list = false;
        for block in &self.blocks {
            let is_item = matches!(block, Block::ListItem { .. });
            if in_list && !is_item {
                out.push_str("</ul>\n");
            } else if !in_list && is_item {
                out.push_str("<ul>\n");
            }
            in_list = is_item;

            match block {
                Block::Heading { level, spans } => {
                    out.push_str(&format!("<h{level}>{}</h{level}>\n", spans_html(spans)));
                }
                Block::Paragraph { spans } => {
                    out.push_str(&format!("<p>{}</p>\n", spans_html(spans)));
                }
                Block::ListItem {
                    depth,
                    marker,
                    spans,
                } => {
                    out.push_str(&format!(
                        "<li class=\"depth-{depth}\">{} {}</li>\n",
                        escape_html(&marker.prefix()),
                        spans_html(spans)
                    ));
                }
                Block::CodeBlock { language, text } => {
                    match language {
                        Some(lang) => out.push_str(&format!(
                            "<pre><code class=\"language-{}\">",
                            escape_html(lang)
                        )),
                        None => out.push_str("<pre><code>"),
                    }
                    out.push_str(&escape_html(text));
                    out.push_str("</code></pre>\n");
                }
                Block::Quote { spans } => {
                    out.push_str(&format!("<blockquote>{}</blockquote>\n", spans_html(spans)));
                }
                Block::Rule => out.push_str("<hr>\n"),
            }
        }
        if in_list {
            out.push_str("</ul>\n");
        }
        out
    }
}

fn join(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

fn spans_html(spans: &[Span]) -> String {
    let mut out = String::new();
    for span in spans {
        let mut text = escape_html(&span.text).replace('\n', "<br>");
        if span.style.code {
            text = format!("<code>{text}</code>");
        }
        if span.style.emphasis {
            text = format!("<em>{text}</em>");
        }
        if span.style.strong {
            text = format!("<strong>{text}</strong>");
        }
        if span.style.strikethrough {
            text = format!("<del>{text}</del>");
        }
        if span.style.link {
            text = format!("<u>{text}</u>");
        }
        out.push_str(&text);
    }
    out
}

/// Escape text for inclusion in HTML
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
