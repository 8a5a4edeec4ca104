//! Conductor Client
//!
//! Thin wrapper around the Conductor for TUI integration.
//! This client embeds the Conductor directly (no network between them) and
//! provides a convenient interface for sending events and receiving messages.
//!
//! # Architecture
//!
//! The TUI is a "thin client" - it doesn't contain any session logic.
//! All orchestration happens in the Conductor. The TUI's job is:
//! 1. Convert terminal events to SurfaceEvents
//! 2. Send SurfaceEvents to Conductor
//! 3. Receive ConductorMessages
//! 4. Render display state based on messages

use tokio::sync::mpsc;

use manual_conductor::{
    Conductor, ConductorConfig, ConductorMessage, HttpManualApi, ManualApi, SurfaceEvent,
};

/// Capacity of the Conductor -> TUI channel
const CHANNEL_CAPACITY: usize = 256;

/// Client for communicating with the embedded Conductor
pub struct ConductorClient<A: ManualApi + 'static = HttpManualApi> {
    /// The embedded Conductor instance
    conductor: Conductor<A>,
    /// Receiver for messages from Conductor
    rx: mpsc::Receiver<ConductorMessage>,
}

impl<A: ManualApi + 'static> ConductorClient<A> {
    /// Create a client around a fresh Conductor for `api`
    pub fn new(api: A, config: ConductorConfig) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let conductor = Conductor::new(api, config, tx);
        Self { conductor, rx }
    }

    /// Start the Conductor (health probe and catalog load)
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.conductor.start().await
    }

    /// Pick a vehicle from the catalog
    pub async fn select_vehicle(&mut self, code: impl Into<String>) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::SelectVehicle { code: code.into() })
            .await
    }

    /// Go back to the vehicle picker
    pub async fn change_vehicle(&mut self) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::ChangeVehicle).await
    }

    /// Re-fetch the vehicle catalog
    pub async fn refresh_catalog(&mut self) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::RefreshCatalog).await
    }

    /// Mirror the input box into the session draft
    pub async fn draft_changed(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::DraftChanged { text: text.into() })
            .await
    }

    /// Submit a question, or run it as a command if it starts with `/`
    pub async fn submit(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        let text = text.into();
        let event = SurfaceEvent::parse_command(&text)
            .unwrap_or(SurfaceEvent::SubmitQuestion { text });
        self.send_event(event).await
    }

    /// Notify Conductor that user wants to quit
    pub async fn request_quit(&mut self) -> anyhow::Result<()> {
        self.send_event(SurfaceEvent::QuitRequested).await
    }

    /// Poll the in-flight question and catalog fetch (must be called regularly)
    pub async fn poll_query(&mut self) -> bool {
        self.conductor.poll_query().await
    }

    /// Receive all pending messages from the Conductor (non-blocking)
    pub fn recv_all(&mut self) -> Vec<ConductorMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Whether the vehicle list is still being fetched
    pub fn catalog_loading(&self) -> bool {
        self.conductor.catalog_loading()
    }

    /// Backend name, for the status line
    pub fn backend_name(&self) -> &str {
        self.conductor.api().name()
    }

    /// Send raw surface event to Conductor
    pub async fn send_event(&mut self, event: SurfaceEvent) -> anyhow::Result<()> {
        self.conductor.handle_event(event).await
    }
}
