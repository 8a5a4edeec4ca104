//! Main Application
//!
//! The App struct manages the TUI lifecycle as a thin display client:
//! - Event loop (keyboard, resize)
//! - ConductorClient for orchestration
//! - DisplayState for rendering
//!
//! The App:
//! 1. Converts terminal events to SurfaceEvents
//! 2. Sends events to the embedded Conductor via ConductorClient
//! 3. Receives ConductorMessages and updates DisplayState
//! 4. Renders the vehicle picker or the chat view from DisplayState

use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};

use manual_conductor::{
    display_name, ConductorMessage, HttpManualApi, ManualApi, MessageRole, NotifyLevel,
    SessionMode,
};

use crate::conductor_client::ConductorClient;
use crate::display::{DisplayMessage, DisplayState};
use crate::theme;
use crate::widgets::{display_width, markup_lines, TextBlock, TextBlockState};

/// Input box height, including its top border
const INPUT_HEIGHT: u16 = 3;

/// Event loop tick
const TICK: Duration = Duration::from_millis(100);

/// Maximum number of input history entries to keep
const MAX_INPUT_HISTORY: usize = 50;

/// Loading spinner frames
const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Quick goodbye messages
const QUICK_GOODBYES: &[&str] = &[
    "안전 운전하세요!",
    "좋은 하루 보내세요!",
    "다음에 또 만나요!",
    "즐거운 드라이브 되세요!",
    "궁금한 점이 생기면 언제든 다시 찾아 주세요!",
];

/// Main application state
pub struct App<A: ManualApi + 'static = HttpManualApi> {
    // === Core State ===
    /// Is the app still running?
    running: bool,
    /// Goodbye message to show on exit
    goodbye_message: Option<String>,
    /// Frames drawn, drives the spinner
    ticks: usize,

    // === Conductor Integration ===
    /// Client for communicating with the embedded Conductor
    conductor: ConductorClient<A>,
    /// Display state derived from ConductorMessages
    display: DisplayState,

    // === Input State ===
    /// Current input text
    input_buffer: String,
    /// Cursor position within input (character index)
    cursor_pos: usize,
    /// Previously submitted inputs
    input_history: Vec<String>,
    /// Position while browsing history
    history_index: Option<usize>,
    /// Input saved when history browsing began
    history_draft: String,

    // === Conversation View ===
    /// Scroll state of the chat log
    conversation: TextBlockState,
    /// Where `/transcript` writes files
    transcript_dir: PathBuf,
}

impl<A: ManualApi + 'static> App<A> {
    /// Create a new App around a client
    pub fn new(conductor: ConductorClient<A>, transcript_dir: PathBuf) -> Self {
        Self {
            running: true,
            goodbye_message: None,
            ticks: 0,
            conductor,
            display: DisplayState::new(),
            input_buffer: String::new(),
            cursor_pos: 0,
            input_history: Vec::new(),
            history_index: None,
            history_draft: String::new(),
            conversation: TextBlockState::default(),
            transcript_dir,
        }
    }

    /// Main event loop
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        let mut event_stream = EventStream::new();

        // Render initial frame immediately so user sees UI
        self.draw(terminal)?;
        self.start().await;
        self.draw(terminal)?;

        while self.running {
            tokio::select! {
                biased;

                // Check for terminal events - highest priority
                maybe_event = event_stream.next() => {
                    match maybe_event {
                        // Only handle Press events (not Release or Repeat)
                        Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                            self.handle_key(key).await;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => tracing::warn!(error = %e, "Terminal event error"),
                        None => self.running = false,
                    }
                }

                // Frame tick
                () = tokio::time::sleep(TICK) => {
                    self.ticks = self.ticks.wrapping_add(1);
                }
            }

            self.tick().await;
            self.draw(terminal)?;
        }

        Ok(())
    }

    /// Start the Conductor and apply what it reports
    pub async fn start(&mut self) {
        if let Err(e) = self.conductor.start().await {
            tracing::warn!(error = %e, "Conductor start error");
        }
        self.process_conductor_messages().await;
    }

    /// Poll the in-flight question and apply pending messages
    pub async fn tick(&mut self) {
        self.conductor.poll_query().await;
        self.process_conductor_messages().await;
        self.display.update();
    }

    /// Process all pending messages from the Conductor
    async fn process_conductor_messages(&mut self) {
        let mut appended = false;
        for msg in self.conductor.recv_all() {
            appended |= matches!(msg, ConductorMessage::MessageAppended { .. });
            self.display.apply_message(msg);
        }

        if appended {
            self.conversation.scroll_to_bottom();
        }
        if self.display.take_draft_cleared() {
            self.input_buffer.clear();
            self.cursor_pos = 0;
        }
        if let Some(text) = self.display.pending_transcript.take() {
            self.export_transcript(&text).await;
        }
        if self.display.quit_requested {
            self.goodbye_message = self.display.goodbye.clone();
            self.running = false;
        }
    }

    /// Write a transcript under the transcript directory
    async fn export_transcript(&mut self, text: &str) {
        let vehicle = self.display.vehicle.as_deref().unwrap_or("conversation");
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let path = self.transcript_dir.join(format!("{vehicle}-{stamp}.txt"));

        let result = async {
            tokio::fs::create_dir_all(&self.transcript_dir).await?;
            tokio::fs::write(&path, text).await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Transcript exported");
                self.display.notify(
                    NotifyLevel::Success,
                    format!("대화를 저장했습니다: {}", path.display()),
                );
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Transcript export failed");
                self.display
                    .notify(NotifyLevel::Error, format!("대화 저장 실패: {e}"));
            }
        }
    }

    // =========================================================================
    // Input
    // =========================================================================

    /// Handle keyboard input
    pub async fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            // Quit
            KeyCode::Esc => self.quit().await,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.quit().await;
            }
            _ => match self.display.mode {
                SessionMode::Selecting => self.handle_picker_key(key).await,
                SessionMode::Chatting => self.handle_chat_key(key).await,
            },
        }
    }

    async fn quit(&mut self) {
        self.generate_goodbye();
        if let Err(e) = self.conductor.request_quit().await {
            tracing::debug!(error = %e, "Quit request failed");
        }
        self.running = false;
    }

    async fn handle_picker_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.display.move_picker(-1),
            KeyCode::Down | KeyCode::Char('j') => self.display.move_picker(1),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index < self.display.vehicles.len() {
                    self.display.picker_index = index;
                    self.select_highlighted().await;
                }
            }
            KeyCode::Enter => self.select_highlighted().await,
            KeyCode::Char('r') | KeyCode::F(5) => {
                if let Err(e) = self.conductor.refresh_catalog().await {
                    tracing::warn!(error = %e, "Catalog refresh failed");
                }
            }
            _ => {}
        }
    }

    async fn select_highlighted(&mut self) {
        let Some(vehicle) = self.display.highlighted() else {
            return;
        };
        if !vehicle.available {
            return;
        }
        let code = vehicle.code.clone();
        if let Err(e) = self.conductor.select_vehicle(code).await {
            tracing::warn!(error = %e, "Vehicle selection failed");
        }
    }

    async fn handle_chat_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_input().await,
            KeyCode::F(2) => {
                if let Err(e) = self.conductor.change_vehicle().await {
                    tracing::warn!(error = %e, "Change vehicle failed");
                }
            }

            // Ctrl+key shortcuts (must come before plain Char)
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input_buffer.clear();
                self.cursor_pos = 0;
                self.draft_changed().await;
            }
            KeyCode::Char('w') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.delete_word_before_cursor();
                self.draft_changed().await;
            }

            // Typing - insert at cursor position
            KeyCode::Char(c) => {
                let byte_pos = self.byte_offset(self.cursor_pos);
                self.input_buffer.insert(byte_pos, c);
                self.cursor_pos += 1;
                self.draft_changed().await;
            }
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    let byte_pos = self.byte_offset(self.cursor_pos - 1);
                    self.input_buffer.remove(byte_pos);
                    self.cursor_pos -= 1;
                    self.draft_changed().await;
                }
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input_buffer.chars().count() {
                    let byte_pos = self.byte_offset(self.cursor_pos);
                    self.input_buffer.remove(byte_pos);
                    self.draft_changed().await;
                }
            }

            // Cursor movement
            KeyCode::Left => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            KeyCode::Right => {
                if self.cursor_pos < self.input_buffer.chars().count() {
                    self.cursor_pos += 1;
                }
            }
            KeyCode::Home => self.cursor_pos = 0,
            KeyCode::End => self.cursor_pos = self.input_buffer.chars().count(),

            // Input history navigation
            KeyCode::Up => self.history_back(),
            KeyCode::Down => self.history_forward(),

            // Conversation scrolling
            KeyCode::PageUp => {
                let page = self.conversation.viewport.max(2) / 2;
                self.conversation.scroll_up(page);
            }
            KeyCode::PageDown => {
                let page = self.conversation.viewport.max(2) / 2;
                self.conversation.scroll_down(page);
            }
            _ => {}
        }
    }

    async fn submit_input(&mut self) {
        let text = self.input_buffer.trim().to_string();
        if text.is_empty() {
            return;
        }
        let is_command = text.starts_with('/');
        // Questions wait for the previous answer; the input stays as typed
        if self.display.is_busy() && !is_command {
            return;
        }

        if self.input_history.last() != Some(&text) {
            self.input_history.push(text.clone());
            if self.input_history.len() > MAX_INPUT_HISTORY {
                self.input_history.remove(0);
            }
        }
        self.history_index = None;
        self.history_draft.clear();

        // Commands never produce DraftCleared, so the box is emptied here
        if is_command {
            self.input_buffer.clear();
            self.cursor_pos = 0;
        }
        if let Err(e) = self.conductor.submit(text).await {
            tracing::warn!(error = %e, "Submit failed");
        }
        self.conversation.scroll_to_bottom();
    }

    async fn draft_changed(&mut self) {
        self.history_index = None;
        let text = self.input_buffer.clone();
        if let Err(e) = self.conductor.draft_changed(text).await {
            tracing::debug!(error = %e, "Draft update failed");
        }
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.input_buffer
            .char_indices()
            .nth(char_index)
            .map_or(self.input_buffer.len(), |(i, _)| i)
    }

    fn delete_word_before_cursor(&mut self) {
        let chars: Vec<char> = self.input_buffer.chars().collect();
        let mut pos = self.cursor_pos.min(chars.len());
        while pos > 0 && chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        let start = self.byte_offset(pos);
        let end = self.byte_offset(self.cursor_pos);
        self.input_buffer.replace_range(start..end, "");
        self.cursor_pos = pos;
    }

    fn history_back(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let idx = match self.history_index {
            None => {
                self.history_draft = self.input_buffer.clone();
                self.input_history.len() - 1
            }
            Some(idx) if idx > 0 => idx - 1,
            Some(_) => return,
        };
        self.history_index = Some(idx);
        self.input_buffer = self.input_history[idx].clone();
        self.cursor_pos = self.input_buffer.chars().count();
    }

    fn history_forward(&mut self) {
        let Some(idx) = self.history_index else {
            return;
        };
        if idx + 1 < self.input_history.len() {
            self.history_index = Some(idx + 1);
            self.input_buffer = self.input_history[idx + 1].clone();
        } else {
            self.history_index = None;
            self.input_buffer = std::mem::take(&mut self.history_draft);
        }
        self.cursor_pos = self.input_buffer.chars().count();
    }

    fn generate_goodbye(&mut self) {
        let idx = rand::random::<usize>() % QUICK_GOODBYES.len();
        self.goodbye_message = Some(QUICK_GOODBYES[idx].to_string());
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the goodbye message for display after TUI closes
    pub fn goodbye(&self) -> Option<&str> {
        self.goodbye_message.as_deref()
    }

    /// Whether the loop should keep going
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Current display state
    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Whether the vehicle list is still being fetched
    pub fn catalog_loading(&self) -> bool {
        self.conductor.catalog_loading()
    }

    /// Current input text
    pub fn input(&self) -> &str {
        &self.input_buffer
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Draw one frame
    pub fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> anyhow::Result<()> {
        terminal.draw(|frame| self.render(frame))?;
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame) {
        let input_height = match self.display.mode {
            SessionMode::Selecting => 0,
            SessionMode::Chatting => INPUT_HEIGHT,
        };
        let [header, body, input, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(input_height),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        self.render_header(frame, header);
        match self.display.mode {
            SessionMode::Selecting => self.render_picker(frame, body),
            SessionMode::Chatting => {
                self.render_conversation(frame, body);
                self.render_input(frame, input);
            }
        }
        self.render_status(frame, status);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let title = match self.display.vehicle.as_deref() {
            Some(code) => format!(" 차량 매뉴얼 도우미 · {}({code})", display_name(code)),
            None => " 차량 매뉴얼 도우미".to_string(),
        };
        let line = Line::from(vec![
            Span::styled(title, theme::label_style(theme::ACCENT_BLUE)),
            Span::styled(
                format!("  [{}]", self.conductor.backend_name()),
                theme::dim(),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_picker(&self, frame: &mut Frame, area: Rect) {
        let mut title = vec![Span::styled(
            "  차량을 선택하세요",
            theme::label_style(theme::ACCENT_SOFT),
        )];
        if self.catalog_loading() {
            let spinner = SPINNER[self.ticks % SPINNER.len()];
            title.push(Span::styled(
                format!("  {spinner} 목록 불러오는 중..."),
                theme::dim(),
            ));
        }
        let mut lines = vec![Line::default(), Line::from(title), Line::default()];
        for (i, vehicle) in self.display.vehicles.iter().enumerate() {
            let highlighted = i == self.display.picker_index;
            let marker = if highlighted { "▸" } else { " " };
            let label = format!(
                "  {marker} {}. {} ({})",
                i + 1,
                vehicle.display_name(),
                vehicle.code
            );
            let mut spans = Vec::new();
            if vehicle.available {
                let style = if highlighted {
                    Style::default()
                        .fg(theme::ACCENT_BLUE)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme::BOT_TEXT)
                };
                spans.push(Span::styled(label, style));
            } else {
                spans.push(Span::styled(label, theme::dim()));
                spans.push(Span::styled("  준비 중", theme::dim()));
            }
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_conversation(&mut self, frame: &mut Frame, area: Rect) {
        let width = usize::from(area.width.saturating_sub(2));
        let lines = self.conversation_lines(width);
        let inner = Rect {
            x: area.x + 1,
            width: area.width.saturating_sub(2),
            ..area
        };
        frame.render_stateful_widget(TextBlock::new(&lines), inner, &mut self.conversation);
    }

    /// Lay out every message for a view `width` columns wide
    fn conversation_lines(&self, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for message in &self.display.messages {
            lines.extend(message_lines(message, width));
            lines.push(Line::default());
        }
        if self.display.is_busy() {
            let frame = SPINNER[self.ticks % SPINNER.len()];
            lines.push(Line::styled(
                format!("{frame} {}", self.display.phase.description()),
                Style::default().fg(theme::ACCENT_SOFT),
            ));
        }
        lines
    }

    fn render_input(&self, frame: &mut Frame, area: Rect) {
        if area.height == 0 {
            return;
        }
        let block = Block::default()
            .borders(Borders::TOP)
            .border_style(theme::dim());
        let inner = block.inner(area);

        let prompt = "› ";
        let (text, style) = if self.input_buffer.is_empty() {
            (
                "질문을 입력하세요 (예: 엔진오일 교환 방법은?)".to_string(),
                theme::dim(),
            )
        } else {
            (self.input_buffer.clone(), Style::default().fg(theme::USER_GREEN))
        };

        // Keep the cursor visible on one line by scrolling horizontally
        let before: String = self.input_buffer.chars().take(self.cursor_pos).collect();
        let available = usize::from(inner.width).saturating_sub(display_width(prompt) + 1);
        let cursor_col = display_width(&before);
        let skip_cols = cursor_col.saturating_sub(available);
        let visible = skip_columns(&text, skip_cols);

        let line = Line::from(vec![
            Span::styled(prompt, theme::label_style(theme::USER_GREEN)),
            Span::styled(visible, style),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), area);

        let offset = u16::try_from(display_width(prompt) + cursor_col - skip_cols).unwrap_or(inner.width);
        let x = inner.x.saturating_add(offset);
        frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let line = if let Some(notification) = &self.display.notification {
            Line::styled(
                format!(" {}", notification.message),
                theme::notify_style(notification.level),
            )
        } else {
            let hints = match self.display.mode {
                SessionMode::Selecting => " ↑/↓ 이동 · Enter 선택 · r 새로고침 · Esc 종료",
                SessionMode::Chatting if self.display.is_busy() => {
                    " 답변을 기다리는 중... · F2 차량 변경 · Esc 종료"
                }
                SessionMode::Chatting => {
                    " Enter 전송 · F2 차량 변경 · PgUp/PgDn 스크롤 · /help · Esc 종료"
                }
            };
            Line::styled(hints, theme::dim())
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Lines for one message: role header, body, citations
fn message_lines(message: &DisplayMessage, width: usize) -> Vec<Line<'static>> {
    let (label, color) = match message.role {
        MessageRole::User => ("You", theme::USER_GREEN),
        MessageRole::Bot if message.is_error => ("Bot", theme::ERROR_RED),
        MessageRole::Bot => ("Bot", theme::ACCENT_BLUE),
    };
    let mut lines = vec![Line::from(vec![
        Span::styled(label, theme::label_style(color)),
        Span::styled(format!("  {}", message.time_label()), theme::dim()),
    ])];

    match message.markup() {
        Some(markup) => {
            let base = if message.is_error {
                Style::default().fg(theme::ERROR_RED)
            } else {
                Style::default().fg(theme::BOT_TEXT)
            };
            lines.extend(markup_lines(markup, width, base));
        }
        None => {
            let style = Style::default().fg(theme::BOT_TEXT);
            for raw in message.content.lines() {
                if raw.is_empty() {
                    lines.push(Line::default());
                    continue;
                }
                for wrapped in textwrap::wrap(raw, width.max(8)) {
                    lines.push(Line::styled(wrapped.into_owned(), style));
                }
            }
        }
    }

    if !message.sources.is_empty() {
        lines.push(Line::styled("출처", theme::dim()));
        for source in &message.sources {
            let options = textwrap::Options::new(width.max(8))
                .initial_indent("  · ")
                .subsequent_indent("    ");
            for wrapped in textwrap::wrap(source, options) {
                lines.push(Line::styled(
                    wrapped.into_owned(),
                    Style::default().fg(theme::SOURCE_GRAY),
                ));
            }
        }
    }

    lines
}

/// Drop the first `cols` display columns of `text`
fn skip_columns(text: &str, cols: usize) -> String {
    let mut skipped = 0;
    text.chars()
        .skip_while(|c| {
            if skipped >= cols {
                return false;
            }
            skipped += unicode_width::UnicodeWidthChar::width(*c).unwrap_or(0);
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use manual_conductor::{ChatMessage, Source};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_bot_message_lines_include_sources() {
        let source = Source(json!({"source": "tucson.json", "section_title": "와이퍼", "page_range": "88"}));
        let message: DisplayMessage = ChatMessage::bot("와이퍼는 **AUTO** 위치", vec![source]).into();

        let texts: Vec<String> = message_lines(&message, 40).iter().map(text_of).collect();

        assert!(texts[0].starts_with("Bot"));
        assert_eq!(texts[1], "와이퍼는 AUTO 위치");
        assert_eq!(texts[2], "출처");
        assert_eq!(texts[3], "  · 와이퍼 p.88 (tucson.json)");
    }

    #[test]
    fn test_user_message_is_not_markdown() {
        let message: DisplayMessage = ChatMessage::user("**그대로**").into();

        let texts: Vec<String> = message_lines(&message, 40).iter().map(text_of).collect();

        assert!(texts[0].starts_with("You"));
        assert_eq!(texts[1], "**그대로**");
    }

    #[test]
    fn test_skip_columns_counts_wide_chars() {
        assert_eq!(skip_columns("가나다", 2), "나다");
        assert_eq!(skip_columns("abc", 0), "abc");
    }
}
