//! Surface Events
//!
//! Events sent from UI surfaces to the Conductor. These report what the user
//! did; the Conductor decides what it means.
//!
//! # Design Philosophy
//!
//! Surfaces never gate on business rules themselves. A surface may grey out a
//! submit key while a question is in flight, but the Conductor still rejects a
//! `SubmitQuestion` that arrives at the wrong time.

use serde::{Deserialize, Serialize};

/// Events from UI Surface to Conductor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    // ============================================
    // Vehicle Selection
    // ============================================
    /// User picked a vehicle from the catalog
    SelectVehicle {
        /// Vehicle code, e.g. `"SONATA"`
        code: String,
    },

    /// User asked to go back to the vehicle picker
    ChangeVehicle,

    /// User asked to re-fetch the vehicle listing
    RefreshCatalog,

    // ============================================
    // Conversation
    // ============================================
    /// The draft input changed
    DraftChanged {
        /// Current draft text
        text: String,
    },

    /// User submitted a question
    SubmitQuestion {
        /// Question text as typed
        text: String,
    },

    /// User entered a slash command
    UserCommand {
        /// Command name (without leading /)
        command: String,
        /// Command arguments
        args: Vec<String>,
    },

    // ============================================
    // Lifecycle
    // ============================================
    /// User wants to quit
    QuitRequested,
}

impl SurfaceEvent {
    /// Interpret raw input as a slash command, if it is one
    ///
    /// `"/vehicle"` becomes `UserCommand { command: "vehicle", args: [] }`.
    /// Anything not starting with `/` (or a bare `/`) yields `None`.
    #[must_use]
    pub fn parse_command(input: &str) -> Option<Self> {
        let rest = input.trim().strip_prefix('/')?;
        let mut parts = rest.split_whitespace();
        let command = parts.next()?.to_lowercase();
        Some(Self::UserCommand {
            command,
            args: parts.map(str::to_string).collect(),
        })
    }
}
