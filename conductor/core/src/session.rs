//! Conversation Session
//!
//! The selected vehicle and the ordered message history for one conversation.
//!
//! # Design Philosophy
//!
//! A session has two modes. In `Selecting` there is no vehicle and no
//! history; in `Chatting` there is exactly one vehicle and a history that only
//! grows. The only way back is [`ConversationSession::change_vehicle`], which
//! throws the history away and mints a new [`SessionId`] so that anything
//! still in flight for the old conversation can be recognised and dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{display_name, VehicleCatalog};
use crate::error::SessionError;
use crate::messages::{MessageId, MessageRole, SessionId, Source};

/// A message in the conversation
///
/// Immutable once appended to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Raw text for user messages, markdown for bot messages
    pub content: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Citations backing a bot answer, in backend order
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Whether this bot message reports a failed query
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: Utc::now(),
            sources: Vec::new(),
            is_error: false,
        }
    }

    /// A question typed by the user
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    /// An answer from the manual assistant
    #[must_use]
    pub fn bot(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            sources,
            ..Self::new(MessageRole::Bot, content.into())
        }
    }

    /// A bot-authored report of a failed query
    #[must_use]
    pub fn bot_error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(MessageRole::Bot, content.into())
        }
    }

    /// The greeting seeded into a fresh conversation
    #[must_use]
    pub fn welcome(code: &str) -> Self {
        Self::bot(
            format!(
                "안녕하세요! **{}({code})** 매뉴얼 도우미입니다.\n\n\
                 차량 사용법이나 점검 방법 등 궁금한 점을 물어보세요.",
                display_name(code)
            ),
            Vec::new(),
        )
    }
}

/// Session mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// No vehicle chosen yet; history is empty
    Selecting,
    /// Conversing about the selected vehicle
    Chatting,
}

impl SessionMode {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Selecting => "차량 선택",
            Self::Chatting => "대화 중",
        }
    }
}

/// A conversation scoped to one selected vehicle
#[derive(Clone, Debug)]
pub struct ConversationSession {
    id: SessionId,
    mode: SessionMode,
    selected_vehicle: Option<String>,
    messages: Vec<ChatMessage>,
    draft: String,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Create a session in `Selecting` mode
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            mode: SessionMode::Selecting,
            selected_vehicle: None,
            messages: Vec::new(),
            draft: String::new(),
        }
    }

    /// Current epoch token
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current mode
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Selected vehicle code, when chatting
    #[must_use]
    pub fn selected_vehicle(&self) -> Option<&str> {
        self.selected_vehicle.as_deref()
    }

    /// Messages in insertion order
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Pending question text
    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Start a conversation about `code`
    ///
    /// Only valid while selecting and only for an available vehicle. Seeds the
    /// history with a welcome message and returns it.
    pub fn select_vehicle(
        &mut self,
        catalog: &VehicleCatalog,
        code: &str,
    ) -> Result<&ChatMessage, SessionError> {
        if self.mode != SessionMode::Selecting {
            return Err(SessionError::AlreadyChatting);
        }
        if !catalog.is_available(code) {
            return Err(SessionError::InvalidSelection(code.to_string()));
        }

        self.id = SessionId::new();
        self.mode = SessionMode::Chatting;
        self.selected_vehicle = Some(code.to_string());
        self.messages.push(ChatMessage::welcome(code));
        tracing::debug!(vehicle = %code, session = %self.id, "Vehicle selected");

        Ok(&self.messages[0])
    }

    /// Return to vehicle selection, discarding the conversation
    ///
    /// Always succeeds. Returns the new epoch token.
    pub fn change_vehicle(&mut self) -> &SessionId {
        let discarded = self.messages.len();
        self.id = SessionId::new();
        self.mode = SessionMode::Selecting;
        self.selected_vehicle = None;
        self.messages.clear();
        self.draft.clear();
        tracing::debug!(discarded, session = %self.id, "Session reset");
        &self.id
    }

    /// Append a message to the end of the history
    pub fn append_message(&mut self, message: ChatMessage) -> Result<&ChatMessage, SessionError> {
        if self.mode != SessionMode::Chatting {
            return Err(SessionError::NotChatting);
        }
        self.messages.push(message);
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Replace the pending question text
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Empty the pending question text
    pub fn clear_draft(&mut self) {
        self.draft.clear();
    }

    /// Plain-text rendering of the conversation
    ///
    /// One entry per message in insertion order, timestamps in local time.
    #[must_use]
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        if let Some(code) = &self.selected_vehicle {
            out.push_str(&format!("# {} ({code})\n\n", display_name(code)));
        }
        for message in &self.messages {
            let time = message.timestamp.with_timezone(&chrono::Local);
            out.push_str(&format!(
                "[{}] {}: {}\n",
                time.format("%H:%M:%S"),
                message.role.label(),
                message.content
            ));
            for source in &message.sources {
                out.push_str(&format!("    - {}\n", source.label()));
            }
        }
        out
    }
}
