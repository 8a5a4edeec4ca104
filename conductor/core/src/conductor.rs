//! Conductor - The Orchestration Core
//!
//! The Conductor owns everything with state: the vehicle catalog, the
//! conversation session, and the query pipeline. It receives
//! [`SurfaceEvent`]s, applies them, and mirrors every resulting change to the
//! surface as [`ConductorMessage`]s.
//!
//! # Design Philosophy
//!
//! There is exactly one writer. The surface's event loop owns the Conductor,
//! forwards user input through [`Conductor::handle_event`], and calls
//! [`Conductor::poll_query`] on every tick. Network work happens in spawned
//! tasks that only ever talk back through channels, so no session state is
//! shared and nothing needs a lock. That includes the catalog fetch: the
//! built-in list is shown at once and replaced when the backend answers.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::backend::ManualApi;
use crate::catalog::VehicleCatalog;
use crate::error::CatalogLoadError;
use crate::events::SurfaceEvent;
use crate::messages::{ConductorMessage, NotifyLevel, SessionId};
use crate::query::{PipelineUpdate, QueryPhase, QueryPipeline, SubmitOutcome};
use crate::session::{ConversationSession, SessionMode};

/// Commands understood by [`Conductor::handle_event`]
pub const HELP_TEXT: &str =
    "명령어: /vehicle 차량 변경 · /transcript 대화 내보내기 · /help 도움말 · /quit 종료";

/// Conductor configuration
#[derive(Clone, Debug)]
pub struct ConductorConfig {
    /// Probe `/health` in the background on start
    pub health_check_on_start: bool,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            health_check_on_start: true,
        }
    }
}

/// Fetched catalog and how the fetch went
type CatalogOutcome = (VehicleCatalog, Result<usize, CatalogLoadError>);

/// Catalog fetch that has not been applied yet
struct CatalogLoad {
    rx: oneshot::Receiver<CatalogOutcome>,
    /// Report the result to the user (manual refresh)
    announce: bool,
}

/// The Conductor - headless orchestration core
pub struct Conductor<A: ManualApi + 'static> {
    /// Configuration
    config: ConductorConfig,
    /// Manual QA backend
    api: Arc<A>,
    /// Known vehicles
    catalog: VehicleCatalog,
    /// Current conversation
    session: ConversationSession,
    /// Question/answer round trips
    pipeline: QueryPipeline<A>,
    /// Catalog fetch in flight
    catalog_load: Option<CatalogLoad>,
    /// Channel to send messages to UI surface
    tx: mpsc::Sender<ConductorMessage>,
}

impl<A: ManualApi + 'static> Conductor<A> {
    /// Create a new Conductor with the given backend
    pub fn new(api: A, config: ConductorConfig, tx: mpsc::Sender<ConductorMessage>) -> Self {
        let api = Arc::new(api);
        let pipeline = QueryPipeline::new(Arc::clone(&api));
        Self {
            config,
            api,
            catalog: VehicleCatalog::default(),
            session: ConversationSession::new(),
            pipeline,
            catalog_load: None,
            tx,
        }
    }

    /// Backend in use
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Configuration in use
    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Vehicle catalog
    pub fn catalog(&self) -> &VehicleCatalog {
        &self.catalog
    }

    /// Current conversation
    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    /// Current session epoch
    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }

    /// Phase of the in-flight question
    pub fn phase(&self) -> QueryPhase {
        self.pipeline.phase()
    }

    /// Whether a catalog fetch is still running
    pub fn catalog_loading(&self) -> bool {
        self.catalog_load.is_some()
    }

    /// Start the Conductor
    ///
    /// Tells the surface what to show right away, using the current catalog,
    /// then fires off the health probe and the catalog fetch in the background.
    /// Neither failure is an error here: both are logged and the built-in
    /// catalog stays in place. The fetched catalog is applied by
    /// [`Conductor::poll_query`].
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.config.health_check_on_start {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move {
                match api.health().await {
                    Ok(report) if report.is_healthy() => {
                        tracing::info!(
                            backend = api.name(),
                            manuals = report.loaded_manuals.len(),
                            "Backend healthy"
                        );
                        tracing::debug!(manuals = ?report.loaded_manuals, "Loaded manuals");
                    }
                    Ok(report) => {
                        tracing::warn!(backend = api.name(), status = %report.status, "Backend not ready");
                    }
                    Err(e) => {
                        tracing::warn!(backend = api.name(), error = %e, "Backend health check failed");
                    }
                }
            });
        }

        self.send(ConductorMessage::Catalog {
            vehicles: self.catalog.vehicles(),
        })
        .await;
        self.send_mode().await;
        self.send(ConductorMessage::Phase {
            phase: self.pipeline.phase(),
        })
        .await;

        self.load_catalog(false);

        Ok(())
    }

    /// Handle an event from the UI surface
    pub async fn handle_event(&mut self, event: SurfaceEvent) -> anyhow::Result<()> {
        match event {
            SurfaceEvent::SelectVehicle { code } => {
                match self.session.select_vehicle(&self.catalog, &code) {
                    Ok(welcome) => {
                        let welcome = welcome.clone();
                        tracing::info!(vehicle = %code, "Conversation started");
                        self.send_mode().await;
                        self.send(ConductorMessage::MessageAppended {
                            session_id: self.session.id().clone(),
                            message: welcome,
                        })
                        .await;
                    }
                    Err(e) => {
                        tracing::debug!(vehicle = %code, error = %e, "Ignoring vehicle selection");
                    }
                }
            }

            SurfaceEvent::ChangeVehicle => {
                self.change_vehicle().await;
            }

            SurfaceEvent::RefreshCatalog => {
                self.load_catalog(true);
            }

            SurfaceEvent::DraftChanged { text } => {
                if self.session.mode() == SessionMode::Chatting {
                    self.session.set_draft(text);
                }
            }

            SurfaceEvent::SubmitQuestion { text } => {
                match self.pipeline.submit(&text, &mut self.session) {
                    SubmitOutcome::Accepted { user_message } => {
                        self.send(ConductorMessage::MessageAppended {
                            session_id: self.session.id().clone(),
                            message: user_message,
                        })
                        .await;
                        self.send(ConductorMessage::DraftCleared).await;
                        self.send(ConductorMessage::Phase {
                            phase: self.pipeline.phase(),
                        })
                        .await;
                    }
                    SubmitOutcome::Rejected(reason) => {
                        tracing::debug!(reason = ?reason, "Question rejected");
                        if let Some(message) = reason.user_message() {
                            self.notify(NotifyLevel::Warning, &message).await;
                        }
                    }
                }
            }

            SurfaceEvent::UserCommand { command, args } => {
                self.handle_command(&command, &args).await?;
            }

            SurfaceEvent::QuitRequested => {
                self.shutdown().await?;
            }
        }

        Ok(())
    }

    /// Forward progress of the in-flight question to the surface
    ///
    /// Also applies a finished catalog fetch. Call this regularly. Returns true
    /// if there was activity.
    pub async fn poll_query(&mut self) -> bool {
        let catalog = self.poll_catalog().await;
        let updates = self.pipeline.poll(&mut self.session);
        let active = !updates.is_empty();
        self.forward(updates).await;
        catalog || active
    }

    /// Wait for the running catalog fetch and apply it
    ///
    /// Returns false when no fetch was running.
    pub async fn wait_for_catalog(&mut self) -> bool {
        let Some(load) = self.catalog_load.take() else {
            return false;
        };
        let outcome = load.rx.await.ok();
        self.apply_catalog(outcome, load.announce).await;
        true
    }

    /// Wait for the in-flight question to finish and forward the result
    ///
    /// Returns false when nothing was in flight.
    pub async fn wait_for_answer(&mut self) -> bool {
        let updates = self.pipeline.wait_for_completion(&mut self.session).await;
        let active = !updates.is_empty();
        self.forward(updates).await;
        active
    }

    async fn forward(&self, updates: Vec<PipelineUpdate>) {
        for update in updates {
            match update {
                PipelineUpdate::Phase(phase) => {
                    self.send(ConductorMessage::Phase { phase }).await;
                }
                PipelineUpdate::Appended(message) => {
                    self.send(ConductorMessage::MessageAppended {
                        session_id: self.session.id().clone(),
                        message,
                    })
                    .await;
                }
            }
        }
    }

    /// Fetch the catalog in the background
    ///
    /// The fetch works on a copy, so the catalog in use never changes until
    /// the result is applied. A second request while one is running is
    /// ignored.
    fn load_catalog(&mut self, announce: bool) {
        if self.catalog_load.is_some() {
            tracing::debug!("Catalog fetch already running");
            return;
        }

        let api = Arc::clone(&self.api);
        let mut catalog = self.catalog.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = catalog.load(api.as_ref()).await;
            // Conductor may be gone already
            let _ = tx.send((catalog, result));
        });
        self.catalog_load = Some(CatalogLoad { rx, announce });
    }

    async fn poll_catalog(&mut self) -> bool {
        let Some(load) = self.catalog_load.as_mut() else {
            return false;
        };
        let outcome = match load.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => return false,
            Err(oneshot::error::TryRecvError::Closed) => None,
        };
        let announce = load.announce;
        self.catalog_load = None;
        self.apply_catalog(outcome, announce).await;
        true
    }

    async fn apply_catalog(&mut self, outcome: Option<CatalogOutcome>, announce: bool) {
        match outcome {
            Some((catalog, Ok(count))) => {
                self.catalog = catalog;
                if announce {
                    self.notify(
                        NotifyLevel::Info,
                        &format!("차량 목록을 새로 불러왔습니다 ({count}종)"),
                    )
                    .await;
                }
            }
            // Logged by the load; the current catalog stays
            Some((_, Err(_))) => {}
            None => tracing::warn!("Catalog fetch ended without a result"),
        }
        self.send(ConductorMessage::Catalog {
            vehicles: self.catalog.vehicles(),
        })
        .await;
    }

    /// Handle a user command
    async fn handle_command(&mut self, command: &str, args: &[String]) -> anyhow::Result<()> {
        match command {
            "help" => {
                self.notify(NotifyLevel::Info, HELP_TEXT).await;
            }
            "vehicle" | "change" => {
                self.change_vehicle().await;
            }
            "transcript" => {
                if self.session.mode() == SessionMode::Chatting {
                    self.send(ConductorMessage::Transcript {
                        text: self.session.transcript(),
                    })
                    .await;
                } else {
                    self.notify(NotifyLevel::Info, "내보낼 대화가 없습니다.").await;
                }
            }
            "quit" | "exit" => {
                self.shutdown().await?;
            }
            _ => {
                tracing::debug!(command, ?args, "Unknown command");
                self.notify(
                    NotifyLevel::Warning,
                    &format!("알 수 없는 명령어입니다: /{command}"),
                )
                .await;
            }
        }

        Ok(())
    }

    /// Abandon any pending answer and go back to vehicle selection
    async fn change_vehicle(&mut self) {
        if self.pipeline.abandon() {
            tracing::info!("Vehicle changed with a question in flight; its answer will be dropped");
        }
        self.session.change_vehicle();
        self.send_mode().await;
        self.send(ConductorMessage::DraftCleared).await;
        self.send(ConductorMessage::Phase {
            phase: self.pipeline.phase(),
        })
        .await;
    }

    /// Shut down the Conductor
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.pipeline.abandon();
        self.catalog_load = None;
        self.send(ConductorMessage::Quit {
            message: Some("이용해 주셔서 감사합니다.".to_string()),
        })
        .await;

        Ok(())
    }

    async fn send_mode(&self) {
        self.send(ConductorMessage::Mode {
            mode: self.session.mode(),
            vehicle: self.session.selected_vehicle().map(str::to_string),
            session_id: self.session.id().clone(),
        })
        .await;
    }

    /// Send notification
    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(ConductorMessage::Notify {
            level,
            message: message.to_string(),
        })
        .await;
    }

    /// Send a message to the UI surface
    async fn send(&self, msg: ConductorMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}
