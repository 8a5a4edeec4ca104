//! Conductor Messages
//!
//! Messages sent from the Conductor to UI surfaces. Every session mutation the
//! Conductor performs is mirrored here so a surface can rebuild its view from
//! the message stream alone.
//!
//! # Design Philosophy
//!
//! The surface is a pure renderer. It never inspects the catalog or the
//! session directly; it displays what the Conductor tells it and reports user
//! intent back as [`SurfaceEvent`](crate::events::SurfaceEvent)s.

use serde::{Deserialize, Serialize};

use crate::catalog::Vehicle;
use crate::query::QueryPhase;
use crate::session::{ChatMessage, SessionMode};

/// Messages from Conductor to UI Surface
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConductorMessage {
    // ============================================
    // Catalog & Session
    // ============================================
    /// The vehicle catalog changed (initial load or refresh)
    Catalog {
        /// Vehicles in catalog order, with availability
        vehicles: Vec<Vehicle>,
    },

    /// The session entered a new mode
    ///
    /// Entering `Selecting` means the previous transcript is gone.
    Mode {
        /// New mode
        mode: SessionMode,
        /// Selected vehicle code, when chatting
        vehicle: Option<String>,
        /// Epoch of the session this mode belongs to
        session_id: SessionId,
    },

    /// A message was appended to the transcript
    MessageAppended {
        /// Epoch the message belongs to
        session_id: SessionId,
        /// The appended message
        message: ChatMessage,
    },

    /// Loading phase of the in-flight question changed
    Phase {
        /// Current phase
        phase: QueryPhase,
    },

    /// The draft input was consumed and should be emptied
    DraftCleared,

    // ============================================
    // System
    // ============================================
    /// Show a transient notification
    Notify {
        /// Severity
        level: NotifyLevel,
        /// Notification text
        message: String,
    },

    /// Plain-text export of the current conversation
    Transcript {
        /// Rendered transcript
        text: String,
    },

    /// The surface should exit
    Quit {
        /// Optional farewell text
        message: Option<String>,
    },
}

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("msg_{id}"))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Session identifier
///
/// Minted on every vehicle selection and every reset. In-flight queries carry
/// the id they were issued under so late results can be recognised as stale.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new unique session ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("session_{}", uuid::Uuid::new_v4().simple()))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    /// Question typed by the user
    User,
    /// Answer, welcome, or error report from the manual assistant
    Bot,
}

impl MessageRole {
    /// Label used in transcripts
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Bot => "Bot",
        }
    }
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}

/// A citation returned alongside an answer
///
/// The backend's citation objects are kept verbatim. The accessors read the
/// fields the QA service is known to emit and return `None` for anything else,
/// so unknown shapes still round-trip to the surface untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(pub serde_json::Value);

impl Source {
    /// Manual document the passage came from
    #[must_use]
    pub fn document(&self) -> Option<&str> {
        self.0.get("source").and_then(serde_json::Value::as_str)
    }

    /// Section heading of the passage
    #[must_use]
    pub fn section_title(&self) -> Option<&str> {
        self.0.get("section_title").and_then(serde_json::Value::as_str)
    }

    /// Page range, e.g. `"5-12"` or `"7"`
    #[must_use]
    pub fn page_range(&self) -> Option<String> {
        match self.0.get("page_range")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Retrieval score
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.0.get("score").and_then(serde_json::Value::as_f64)
    }

    /// One-line description for display
    #[must_use]
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = self.section_title() {
            parts.push(title.to_string());
        }
        if let Some(pages) = self.page_range() {
            parts.push(format!("p.{pages}"));
        }
        if let Some(doc) = self.document() {
            parts.push(format!("({doc})"));
        }
        if parts.is_empty() {
            return match &self.0 {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
        parts.join(" ")
    }
}
