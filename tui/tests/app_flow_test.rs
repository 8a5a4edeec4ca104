//! App Flow Tests
//!
//! Drives the TUI [`App`] with synthetic key presses against an in-memory
//! backend and a `TestBackend` terminal: pick a vehicle, ask a question, export
//! the transcript, change vehicle, quit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pretty_assertions::assert_eq;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;

use manual_conductor::{
    AskRequest, AskResponse, CatalogLoadError, ConductorConfig, HealthReport, ManualApi,
    MessageRole, QueryEvent, SessionMode, VehicleListing,
};
use manual_tui::{App, ConductorClient};

// ============================================================================
// In-memory backend
// ============================================================================

/// Answers every question at once, echoing it back
struct EchoApi {
    asks: Arc<AtomicUsize>,
}

#[async_trait]
impl ManualApi for EchoApi {
    fn name(&self) -> &str {
        "Echo"
    }

    async fn health(&self) -> anyhow::Result<HealthReport> {
        Ok(HealthReport {
            status: "healthy".to_string(),
            loaded_manuals: Vec::new(),
            embedding_model_ready: None,
            answer_generator_ready: None,
        })
    }

    async fn vehicles(&self) -> Result<VehicleListing, CatalogLoadError> {
        Ok(VehicleListing {
            vehicles: vec!["GRANDEUR".to_string(), "KONA".to_string()],
            available_vehicles: vec!["KONA".to_string()],
        })
    }

    fn ask(&self, request: AskRequest) -> mpsc::Receiver<QueryEvent> {
        self.asks.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(4);
        let _ = tx.try_send(QueryEvent::ResponseReceived);
        let _ = tx.try_send(QueryEvent::Completed(Ok(AskResponse {
            answer: format!("**ANSWER** for {}: 35psi", request.q),
            sources: Vec::new(),
            vehicle: Some(request.vehicle),
        })));
        rx
    }
}

/// Never answers `/vehicles`
struct StalledApi;

#[async_trait]
impl ManualApi for StalledApi {
    fn name(&self) -> &str {
        "Stalled"
    }

    async fn health(&self) -> anyhow::Result<HealthReport> {
        anyhow::bail!("not used")
    }

    async fn vehicles(&self) -> Result<VehicleListing, CatalogLoadError> {
        std::future::pending().await
    }

    fn ask(&self, _request: AskRequest) -> mpsc::Receiver<QueryEvent> {
        let (_tx, rx) = mpsc::channel(1);
        rx
    }
}

fn app(transcripts: &std::path::Path) -> (App<EchoApi>, Arc<AtomicUsize>) {
    let asks = Arc::new(AtomicUsize::new(0));
    let api = EchoApi {
        asks: Arc::clone(&asks),
    };
    let config = ConductorConfig {
        health_check_on_start: false,
    };
    let client = ConductorClient::new(api, config);
    (App::new(client, transcripts.to_path_buf()), asks)
}

/// Start the app and let the catalog fetch land
async fn start<A: ManualApi + 'static>(app: &mut App<A>) {
    app.start().await;
    for _ in 0..100 {
        if !app.catalog_loading() {
            break;
        }
        tokio::task::yield_now().await;
        app.tick().await;
    }
    assert!(!app.catalog_loading(), "catalog fetch never finished");
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

async fn type_text(app: &mut App<EchoApi>, text: &str) {
    for c in text.chars() {
        app.handle_key(key(KeyCode::Char(c))).await;
    }
}

fn screen(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let mut out = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            out.push_str(buffer[(x, y)].symbol());
        }
        out.push('\n');
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_picker_starts_on_first_available_vehicle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = app(dir.path());
    start(&mut app).await;

    let display = app.display();
    assert_eq!(display.mode, SessionMode::Selecting);
    assert_eq!(display.vehicles.len(), 2);
    assert_eq!(display.highlighted().map(|v| v.code.as_str()), Some("KONA"));

    let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
    app.draw(&mut terminal).unwrap();
    assert!(screen(&terminal).contains("(KONA)"));
}

#[tokio::test]
async fn test_picker_is_usable_while_catalog_is_stalled() {
    let config = ConductorConfig {
        health_check_on_start: false,
    };
    let client = ConductorClient::new(StalledApi, config);
    let dir = tempfile::tempdir().unwrap();
    let mut app = App::new(client, dir.path().to_path_buf());

    tokio::time::timeout(std::time::Duration::from_millis(200), app.start())
        .await
        .expect("start waited on the catalog");
    app.tick().await;

    assert!(app.catalog_loading());
    assert_eq!(app.display().vehicles.len(), 7);
    let mut terminal = Terminal::new(TestBackend::new(60, 14)).unwrap();
    app.draw(&mut terminal).unwrap();
    // Wide glyphs leave blank trailing cells
    assert!(screen(&terminal).replace(' ', "").contains("목록불러오는중"));

    app.handle_key(key(KeyCode::Esc)).await;
    assert!(!app.is_running());
}

#[tokio::test]
async fn test_unavailable_vehicle_is_not_selected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = app(dir.path());
    start(&mut app).await;

    // GRANDEUR is row 1 and not available
    app.handle_key(key(KeyCode::Char('1'))).await;
    app.tick().await;

    assert_eq!(app.display().mode, SessionMode::Selecting);
}

#[tokio::test]
async fn test_question_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, asks) = app(dir.path());
    start(&mut app).await;

    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;
    assert_eq!(app.display().mode, SessionMode::Chatting);
    assert_eq!(app.display().vehicle.as_deref(), Some("KONA"));
    assert_eq!(app.display().messages.len(), 1);

    type_text(&mut app, "tire").await;
    assert_eq!(app.input(), "tire");
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    let display = app.display();
    assert_eq!(asks.load(Ordering::SeqCst), 1);
    assert_eq!(app.input(), "");
    assert!(!display.is_busy());
    let roles: Vec<MessageRole> = display.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::Bot, MessageRole::User, MessageRole::Bot]);

    let mut terminal = Terminal::new(TestBackend::new(60, 20)).unwrap();
    app.draw(&mut terminal).unwrap();
    let screen = screen(&terminal);
    assert!(screen.contains("ANSWER for tire: 35psi"));
    assert!(!screen.contains("**ANSWER**"));
}

#[tokio::test]
async fn test_empty_input_is_not_submitted() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, asks) = app(dir.path());
    start(&mut app).await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    type_text(&mut app, "   ").await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    assert_eq!(asks.load(Ordering::SeqCst), 0);
    assert_eq!(app.display().messages.len(), 1);
}

#[tokio::test]
async fn test_transcript_command_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = app(dir.path());
    start(&mut app).await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    type_text(&mut app, "/transcript").await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    assert_eq!(app.input(), "");
    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    let path = files[0].as_ref().unwrap().path();
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("KONA-"));
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("(KONA)"));
}

#[tokio::test]
async fn test_change_vehicle_returns_to_picker() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = app(dir.path());
    start(&mut app).await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;
    type_text(&mut app, "half typed").await;

    app.handle_key(key(KeyCode::F(2))).await;
    app.tick().await;

    let display = app.display();
    assert_eq!(display.mode, SessionMode::Selecting);
    assert!(display.messages.is_empty());
    assert_eq!(display.vehicle, None);
    assert_eq!(app.input(), "");
}

#[tokio::test]
async fn test_unknown_command_warns() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, asks) = app(dir.path());
    start(&mut app).await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    type_text(&mut app, "/teleport").await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    assert_eq!(asks.load(Ordering::SeqCst), 0);
    let notification = app.display().notification.as_ref().unwrap();
    assert!(notification.message.contains("/teleport"));
}

#[tokio::test]
async fn test_quit_command_stops_app() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = app(dir.path());
    start(&mut app).await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    type_text(&mut app, "/quit").await;
    app.handle_key(key(KeyCode::Enter)).await;
    app.tick().await;

    assert!(!app.is_running());
    assert_eq!(app.goodbye(), Some("이용해 주셔서 감사합니다."));
}

#[tokio::test]
async fn test_escape_quits_with_goodbye() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = app(dir.path());
    start(&mut app).await;

    app.handle_key(key(KeyCode::Esc)).await;

    assert!(!app.is_running());
    assert!(app.goodbye().is_some());
}
