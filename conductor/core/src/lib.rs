//! Manual Conductor - Headless Session Core for the Vehicle Manual QA Client
//!
//! This crate holds everything about a manual QA conversation that has state
//! or ordering concerns, completely independent of any UI framework: which
//! vehicles exist, which one is selected, what has been said, and whether a
//! question is in flight.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        UI Surface (TUI)                       │
//! │        picker · chat view · draft input · status line         │
//! └───────────────┬──────────────────────────────▲────────────────┘
//!                 │ SurfaceEvent (up)            │ ConductorMessage (down)
//! ┌───────────────▼──────────────────────────────┴────────────────┐
//! │                          Conductor                             │
//! │  ┌──────────────┐  ┌─────────────────────┐  ┌───────────────┐ │
//! │  │VehicleCatalog│  │ConversationSession  │  │ QueryPipeline │ │
//! │  └──────┬───────┘  └─────────────────────┘  └──────┬────────┘ │
//! └─────────┼──────────────────────────────────────────┼──────────┘
//!           │ GET /vehicles, GET /health               │ POST /ask
//!     ┌─────▼──────────────────────────────────────────▼─────┐
//!     │                ManualApi (HTTP backend)              │
//!     └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: owns catalog, session and pipeline; talks to the surface
//! - [`VehicleCatalog`]: known vehicles and which are selectable
//! - [`ConversationSession`]: selected vehicle plus ordered history
//! - [`QueryPipeline`]: one question/answer round trip at a time
//! - [`render()`]: answer markdown to sanitized [`Markup`]
//! - [`ManualApi`]: the backend seam, implemented by [`HttpManualApi`]
//!
//! # Quick Start
//!
//! ```ignore
//! use manual_conductor::{ApiConfig, Conductor, ConductorConfig, HttpManualApi, SurfaceEvent};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel(100);
//! let api = HttpManualApi::new(ApiConfig::default())?;
//! let mut conductor = Conductor::new(api, ConductorConfig::default(), tx);
//! conductor.start().await?;
//!
//! conductor.handle_event(SurfaceEvent::SelectVehicle { code: "SONATA".into() }).await?;
//! conductor.handle_event(SurfaceEvent::SubmitQuestion { text: "엔진오일 교환 방법은?".into() }).await?;
//!
//! loop {
//!     conductor.poll_query().await;
//!     while let Ok(msg) = rx.try_recv() {
//!         // Render message to UI
//!     }
//! }
//! ```
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod catalog;
pub mod conductor;
pub mod error;
pub mod events;
pub mod messages;
pub mod query;
pub mod render;
pub mod session;

// Re-exports for convenience
pub use backend::{
    ApiConfig, AskRequest, AskResponse, HealthReport, HttpManualApi, ManualApi, QueryEvent,
    DEFAULT_BASE_URL,
};
pub use catalog::{display_name, Vehicle, VehicleCatalog, VehicleListing, DEFAULT_VEHICLES};
pub use conductor::{Conductor, ConductorConfig, HELP_TEXT};
pub use error::{CatalogLoadError, QueryError, SessionError};
pub use events::SurfaceEvent;
pub use messages::{ConductorMessage, MessageId, MessageRole, NotifyLevel, SessionId, Source};
pub use query::{PipelineUpdate, QueryPhase, QueryPipeline, RejectReason, SubmitOutcome};
pub use render::{render, Block, ListMarker, Markup, Span, SpanStyle};
pub use session::{ChatMessage, ConversationSession, SessionMode};
