//! Display State Types
//!
//! Types that represent the current display state for the TUI.
//! These are derived from ConductorMessages and used for rendering.
//!
//! # Design Philosophy
//!
//! The TUI is a "thin client" - it just renders what the Conductor tells it to.
//! Display state is the bridge between ConductorMessages and rendering.
//!
//! - DisplayMessage: A conversation message with its cached markup
//! - DisplayState: Picker, transcript, phase, and notification

use std::cell::OnceCell;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, Utc};

use manual_conductor::{
    render, ChatMessage, ConductorMessage, Markup, MessageId, MessageRole, NotifyLevel,
    QueryPhase, SessionId, SessionMode, Vehicle,
};

/// How long a notification stays on the status line
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(6);

/// A conversation message as the TUI shows it
#[derive(Clone, Debug)]
pub struct DisplayMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Raw text (user) or markdown (bot)
    pub content: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// One-line citation labels
    pub sources: Vec<String>,
    /// Whether this reports a failed question
    pub is_error: bool,
    /// Rendered markup, filled the first time the message is drawn
    markup: OnceCell<Markup>,
}

impl DisplayMessage {
    /// Local wall-clock time, `HH:MM`
    pub fn time_label(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// Rendered markup for bot messages; user text is never parsed
    pub fn markup(&self) -> Option<&Markup> {
        match self.role {
            MessageRole::Bot => Some(self.markup.get_or_init(|| render(&self.content))),
            MessageRole::User => None,
        }
    }

    /// Whether the markup has been rendered yet
    pub fn is_rendered(&self) -> bool {
        self.markup.get().is_some()
    }
}

impl From<ChatMessage> for DisplayMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            role: message.role,
            content: message.content,
            timestamp: message.timestamp,
            sources: message.sources.iter().map(|s| s.label()).collect(),
            is_error: message.is_error,
            markup: OnceCell::new(),
        }
    }
}

/// A notification to display
#[derive(Clone, Debug)]
pub struct DisplayNotification {
    /// Notification level
    pub level: NotifyLevel,
    /// Message content
    pub message: String,
    /// When it was raised
    pub shown_at: Instant,
}

impl DisplayNotification {
    /// Whether it has been up for longer than [`NOTIFICATION_TTL`]
    pub fn is_expired(&self) -> bool {
        self.shown_at.elapsed() >= NOTIFICATION_TTL
    }
}

/// The full display state for the TUI
#[derive(Clone, Debug)]
pub struct DisplayState {
    /// Catalog entries, in order
    pub vehicles: Vec<Vehicle>,
    /// Highlighted row in the picker
    pub picker_index: usize,
    /// Selecting or chatting
    pub mode: SessionMode,
    /// Selected vehicle code, when chatting
    pub vehicle: Option<String>,
    /// Epoch the transcript belongs to
    pub session_id: Option<SessionId>,
    /// Conversation messages
    pub messages: Vec<DisplayMessage>,
    /// Loading phase of the current question
    pub phase: QueryPhase,
    /// Pending notification (if any)
    pub notification: Option<DisplayNotification>,
    /// Transcript text waiting to be exported
    pub pending_transcript: Option<String>,
    /// Whether the Conductor asked the surface to exit
    pub quit_requested: bool,
    /// Farewell text from the Conductor
    pub goodbye: Option<String>,
    /// Set when the input box must be emptied
    pub draft_cleared: bool,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            vehicles: Vec::new(),
            picker_index: 0,
            mode: SessionMode::Selecting,
            vehicle: None,
            session_id: None,
            messages: Vec::new(),
            phase: QueryPhase::Idle,
            notification: None,
            pending_transcript: None,
            quit_requested: false,
            goodbye: None,
            draft_cleared: false,
        }
    }
}

impl DisplayState {
    /// Create a new display state
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a ConductorMessage to update display state
    pub fn apply_message(&mut self, msg: ConductorMessage) {
        match msg {
            ConductorMessage::Catalog { vehicles } => {
                self.vehicles = vehicles;
                self.clamp_picker();
            }
            ConductorMessage::Mode {
                mode,
                vehicle,
                session_id,
            } => {
                // A new epoch never inherits the old transcript
                if self.session_id.as_ref() != Some(&session_id) {
                    self.messages.clear();
                }
                self.mode = mode;
                self.vehicle = vehicle;
                self.session_id = Some(session_id);
                if mode == SessionMode::Selecting {
                    self.clamp_picker();
                }
            }
            ConductorMessage::MessageAppended {
                session_id,
                message,
            } => {
                if self.session_id.as_ref() == Some(&session_id) {
                    self.messages.push(message.into());
                } else {
                    tracing::debug!(session = %session_id, "Ignoring message for another session");
                }
            }
            ConductorMessage::Phase { phase } => {
                self.phase = phase;
            }
            ConductorMessage::DraftCleared => {
                self.draft_cleared = true;
            }
            ConductorMessage::Notify { level, message } => {
                self.notify(level, message);
            }
            ConductorMessage::Transcript { text } => {
                self.pending_transcript = Some(text);
            }
            ConductorMessage::Quit { message } => {
                self.quit_requested = true;
                self.goodbye = message;
            }
        }
    }

    /// Show a notification raised by the surface itself
    pub fn notify(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.notification = Some(DisplayNotification {
            level,
            message: message.into(),
            shown_at: Instant::now(),
        });
    }

    /// Drop an expired notification
    pub fn update(&mut self) {
        if self.notification.as_ref().is_some_and(DisplayNotification::is_expired) {
            self.notification = None;
        }
    }

    /// Take the draft-cleared flag
    pub fn take_draft_cleared(&mut self) -> bool {
        std::mem::take(&mut self.draft_cleared)
    }

    /// Whether a question is in flight
    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// Move the picker cursor by `delta`, wrapping around
    pub fn move_picker(&mut self, delta: isize) {
        let len = self.vehicles.len();
        if len == 0 {
            return;
        }
        let len = isize::try_from(len).unwrap_or(isize::MAX);
        let current = isize::try_from(self.picker_index).unwrap_or(0);
        let next = (current + delta).rem_euclid(len);
        self.picker_index = usize::try_from(next).unwrap_or(0);
    }

    /// Highlighted vehicle, if any
    pub fn highlighted(&self) -> Option<&Vehicle> {
        self.vehicles.get(self.picker_index)
    }

    fn clamp_picker(&mut self) {
        if self.picker_index >= self.vehicles.len() {
            self.picker_index = 0;
        }
        if !self.highlighted().is_some_and(|v| v.available) {
            if let Some(first) = self.vehicles.iter().position(|v| v.available) {
                self.picker_index = first;
            }
        }
    }
}
