//! Query Pipeline
//!
//! One question/answer round trip: the user's message goes into the
//! transcript immediately, the question is sent to the backend, and exactly one
//! bot message (answer or error report) follows when the round trip ends.
//!
//! # Design Philosophy
//!
//! The pipeline owns the single-in-flight rule. A surface may disable its
//! submit key while a question is pending, but [`QueryPipeline::submit`] checks
//! the phase itself, so a second key binding or a scripted caller cannot start
//! an overlapping request.
//!
//! There is no real cancellation. Each in-flight query remembers the
//! [`SessionId`] it was issued under, and its result is only committed if the
//! session still carries that id. A vehicle change mints a new id, so late
//! answers for the old conversation are dropped.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::backend::{AskRequest, AskResponse, ManualApi, QueryEvent};
use crate::error::QueryError;
use crate::messages::SessionId;
use crate::session::{ChatMessage, ConversationSession, SessionMode};

/// Loading phase of the current question
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryPhase {
    /// Nothing in flight
    #[default]
    Idle,
    /// Request sent, waiting for the backend to respond
    Searching,
    /// Response arrived, body being read
    Generating,
}

impl QueryPhase {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "준비됨",
            Self::Searching => "매뉴얼 검색 중...",
            Self::Generating => "답변 생성 중...",
        }
    }

    /// Whether a question is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// Why a submit was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// Question was empty after trimming
    EmptyQuestion,
    /// No vehicle is selected
    NotChatting,
    /// Another question is still in flight
    Busy,
}

impl RejectReason {
    /// Text shown to the user, if the rejection is worth mentioning
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::EmptyQuestion => None,
            Self::NotChatting => Some("먼저 차량을 선택해주세요.".to_string()),
            Self::Busy => Some("이전 질문에 대한 답변을 기다리는 중입니다.".to_string()),
        }
    }
}

/// Result of [`QueryPipeline::submit`]
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// The question was appended and sent
    Accepted {
        /// The user message that was appended
        user_message: ChatMessage,
    },
    /// Nothing changed
    Rejected(RejectReason),
}

/// Something observable that happened while polling
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineUpdate {
    /// Phase changed
    Phase(QueryPhase),
    /// A bot message was appended to the session
    Appended(ChatMessage),
}

/// A question waiting for its answer
#[derive(Debug)]
struct InFlightQuery {
    session_id: SessionId,
    vehicle: String,
    rx: mpsc::Receiver<QueryEvent>,
    started: Instant,
}

/// Drives question/answer round trips against a [`ManualApi`]
pub struct QueryPipeline<A: ManualApi + ?Sized> {
    api: Arc<A>,
    phase: QueryPhase,
    in_flight: Option<InFlightQuery>,
}

impl<A: ManualApi + ?Sized> QueryPipeline<A> {
    /// Create an idle pipeline
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            phase: QueryPhase::Idle,
            in_flight: None,
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    /// Whether a question is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Submit a question for the session's vehicle
    ///
    /// The question is trimmed; the transcript and the request both carry the
    /// trimmed text. On acceptance the user message is appended, the draft is
    /// cleared, and the request is started, all before this returns. On
    /// rejection nothing changes and no request is made.
    pub fn submit(&mut self, text: &str, session: &mut ConversationSession) -> SubmitOutcome {
        let question = text.trim();
        if question.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyQuestion);
        }
        let Some(vehicle) = session.selected_vehicle().map(str::to_string) else {
            return SubmitOutcome::Rejected(RejectReason::NotChatting);
        };
        if session.mode() != SessionMode::Chatting {
            return SubmitOutcome::Rejected(RejectReason::NotChatting);
        }
        if self.phase.is_busy() || self.in_flight.is_some() {
            tracing::debug!(phase = ?self.phase, "Rejecting overlapping question");
            return SubmitOutcome::Rejected(RejectReason::Busy);
        }

        let user_message = match session.append_message(ChatMessage::user(question)) {
            Ok(message) => message.clone(),
            Err(_) => return SubmitOutcome::Rejected(RejectReason::NotChatting),
        };
        session.clear_draft();

        self.phase = QueryPhase::Searching;
        let rx = self.api.ask(AskRequest::new(question, vehicle.clone()));
        tracing::info!(vehicle = %vehicle, backend = self.api.name(), "Question submitted");

        self.in_flight = Some(InFlightQuery {
            session_id: session.id().clone(),
            vehicle,
            rx,
            started: Instant::now(),
        });

        SubmitOutcome::Accepted { user_message }
    }

    /// Collect progress without waiting
    ///
    /// Call this from the event loop. Returns what changed, in order.
    pub fn poll(&mut self, session: &mut ConversationSession) -> Vec<PipelineUpdate> {
        let mut updates = Vec::new();
        let Some(in_flight) = self.in_flight.as_mut() else {
            return updates;
        };

        let mut completion = None;
        loop {
            match in_flight.rx.try_recv() {
                Ok(QueryEvent::ResponseReceived) => {
                    if self.phase == QueryPhase::Searching {
                        self.phase = QueryPhase::Generating;
                        updates.push(PipelineUpdate::Phase(QueryPhase::Generating));
                    }
                }
                Ok(QueryEvent::Completed(result)) => {
                    completion = Some(result);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    completion = Some(Err(request_vanished()));
                    break;
                }
            }
        }

        if let Some(result) = completion {
            self.finish(result, session, &mut updates);
        }
        updates
    }

    /// Wait until the in-flight question completes
    ///
    /// Returns immediately when nothing is in flight.
    pub async fn wait_for_completion(
        &mut self,
        session: &mut ConversationSession,
    ) -> Vec<PipelineUpdate> {
        let mut updates = Vec::new();
        let Some(in_flight) = self.in_flight.as_mut() else {
            return updates;
        };

        let result = loop {
            match in_flight.rx.recv().await {
                Some(QueryEvent::ResponseReceived) => {
                    if self.phase == QueryPhase::Searching {
                        self.phase = QueryPhase::Generating;
                        updates.push(PipelineUpdate::Phase(QueryPhase::Generating));
                    }
                }
                Some(QueryEvent::Completed(result)) => break result,
                None => break Err(request_vanished()),
            }
        };

        self.finish(result, session, &mut updates);
        updates
    }

    /// Forget the in-flight question, if any
    ///
    /// Its result will never be committed. Returns whether anything was
    /// abandoned.
    pub fn abandon(&mut self) -> bool {
        self.phase = QueryPhase::Idle;
        match self.in_flight.take() {
            Some(in_flight) => {
                tracing::debug!(
                    vehicle = %in_flight.vehicle,
                    session = %in_flight.session_id,
                    "Abandoned in-flight question"
                );
                true
            }
            None => false,
        }
    }

    fn finish(
        &mut self,
        result: Result<AskResponse, QueryError>,
        session: &mut ConversationSession,
        updates: &mut Vec<PipelineUpdate>,
    ) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let elapsed_ms = in_flight.started.elapsed().as_millis();

        if in_flight.session_id == *session.id() {
            let message = match result {
                Ok(response) => {
                    tracing::info!(
                        vehicle = %in_flight.vehicle,
                        sources = response.sources.len(),
                        elapsed_ms,
                        "Answer received"
                    );
                    ChatMessage::bot(response.answer, response.sources)
                }
                Err(e) => {
                    tracing::warn!(vehicle = %in_flight.vehicle, error = %e, elapsed_ms, "Question failed");
                    ChatMessage::bot_error(e.user_message())
                }
            };
            match session.append_message(message) {
                Ok(appended) => updates.push(PipelineUpdate::Appended(appended.clone())),
                Err(e) => tracing::debug!(error = %e, "Dropping answer for inactive session"),
            }
        } else {
            tracing::debug!(
                issued = %in_flight.session_id,
                current = %session.id(),
                elapsed_ms,
                "Dropping stale answer"
            );
        }

        self.phase = QueryPhase::Idle;
        updates.push(PipelineUpdate::Phase(QueryPhase::Idle));
    }
}

fn request_vanished() -> QueryError {
    QueryError::Network("request ended without a response".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HealthReport;
    use crate::catalog::{VehicleCatalog, VehicleListing};
    use crate::error::CatalogLoadError;
    use crate::messages::MessageRole;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Answers every question immediately with a canned result
    struct InstantApi {
        calls: AtomicUsize,
        result: Result<AskResponse, QueryError>,
    }

    impl InstantApi {
        fn answering(answer: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Ok(AskResponse {
                    answer: answer.to_string(),
                    sources: Vec::new(),
                    vehicle: None,
                }),
            }
        }

        fn failing(error: QueryError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: Err(error),
            }
        }
    }

    #[async_trait::async_trait]
    impl ManualApi for InstantApi {
        fn name(&self) -> &str {
            "Instant"
        }

        async fn health(&self) -> anyhow::Result<HealthReport> {
            anyhow::bail!("not used")
        }

        async fn vehicles(&self) -> Result<VehicleListing, CatalogLoadError> {
            Err(CatalogLoadError::Empty)
        }

        fn ask(&self, _request: AskRequest) -> mpsc::Receiver<QueryEvent> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel(4);
            tx.try_send(QueryEvent::ResponseReceived).unwrap();
            tx.try_send(QueryEvent::Completed(self.result.clone())).unwrap();
            rx
        }
    }

    // Records requests and never answers
    #[derive(Default)]
    struct RecordingApi {
        requests: std::sync::Mutex<Vec<AskRequest>>,
    }

    #[async_trait::async_trait]
    impl ManualApi for RecordingApi {
        fn name(&self) -> &str {
            "Recording"
        }

        async fn health(&self) -> anyhow::Result<HealthReport> {
            anyhow::bail!("not used")
        }

        async fn vehicles(&self) -> Result<VehicleListing, CatalogLoadError> {
            Err(CatalogLoadError::Empty)
        }

        fn ask(&self, request: AskRequest) -> mpsc::Receiver<QueryEvent> {
            self.requests.lock().unwrap().push(request);
            let (_tx, rx) = mpsc::channel(1);
            rx
        }
    }

    fn chatting() -> ConversationSession {
        let mut session = ConversationSession::new();
        session
            .select_vehicle(&VehicleCatalog::default(), "SANTAFE")
            .unwrap();
        session
    }

    #[test]
    fn test_phase_description() {
        assert_eq!(QueryPhase::Searching.description(), "매뉴얼 검색 중...");
        assert_eq!(QueryPhase::Generating.description(), "답변 생성 중...");
        assert!(!QueryPhase::Idle.is_busy());
    }

    #[test]
    fn test_empty_question_rejected() {
        let api = Arc::new(InstantApi::answering("x"));
        let mut pipeline = QueryPipeline::new(api.clone());
        let mut session = chatting();

        let outcome = pipeline.submit("   \n", &mut session);
        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::EmptyQuestion));
        assert_eq!(session.messages().len(), 1);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_submit_requires_chatting() {
        let api = Arc::new(InstantApi::answering("x"));
        let mut pipeline = QueryPipeline::new(api.clone());
        let mut session = ConversationSession::new();

        let outcome = pipeline.submit("질문", &mut session);
        assert_eq!(outcome, SubmitOutcome::Rejected(RejectReason::NotChatting));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.phase(), QueryPhase::Idle);
    }

    #[test]
    fn test_long_question_is_sent_and_answered() {
        let api = Arc::new(InstantApi::answering("x"));
        let mut pipeline = QueryPipeline::new(api.clone());
        let mut session = chatting();
        let question = "가".repeat(5000);

        let outcome = pipeline.submit(&question, &mut session);
        assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        pipeline.poll(&mut session);
        let roles: Vec<MessageRole> = session.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::Bot, MessageRole::User, MessageRole::Bot]);
        assert_eq!(session.messages()[1].content, question);
    }

    #[test]
    fn test_transcript_and_request_see_trimmed_question() {
        let api = Arc::new(RecordingApi::default());
        let mut pipeline = QueryPipeline::new(api.clone());
        let mut session = chatting();

        let outcome = pipeline.submit("  와이퍼 교체 방법은?\n", &mut session);

        let SubmitOutcome::Accepted { user_message } = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(user_message.content, "와이퍼 교체 방법은?");
        assert_eq!(session.messages()[1].content, "와이퍼 교체 방법은?");
        let sent = api.requests.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].q, "와이퍼 교체 방법은?");
        assert_eq!(sent[0].vehicle, "SANTAFE");
    }

    #[test]
    fn test_submit_appends_user_message_and_clears_draft() {
        let api = Arc::new(InstantApi::answering("x"));
        let mut pipeline = QueryPipeline::new(api.clone());
        let mut session = chatting();
        session.set_draft("브레이크 패드");

        let outcome = pipeline.submit("브레이크 패드", &mut session);

        let SubmitOutcome::Accepted { user_message } = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(user_message.role, MessageRole::User);
        assert_eq!(user_message.content, "브레이크 패드");
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.draft(), "");
        assert_eq!(pipeline.phase(), QueryPhase::Searching);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_poll_reports_phases_then_answer() {
        let api = Arc::new(InstantApi::answering("**교환 주기**는 1만 km"));
        let mut pipeline = QueryPipeline::new(api);
        let mut session = chatting();

        pipeline.submit("교환 주기?", &mut session);
        let updates = pipeline.poll(&mut session);

        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], PipelineUpdate::Phase(QueryPhase::Generating));
        assert!(matches!(&updates[1], PipelineUpdate::Appended(m) if m.content.contains("1만 km")));
        assert_eq!(updates[2], PipelineUpdate::Phase(QueryPhase::Idle));
        assert_eq!(session.messages().len(), 3);
        assert_eq!(pipeline.phase(), QueryPhase::Idle);
        assert!(!pipeline.is_busy());
    }

    #[test]
    fn test_failure_becomes_error_message() {
        let api = Arc::new(InstantApi::failing(QueryError::Http {
            status: 503,
            detail: Some("시스템이 아직 준비되지 않았습니다.".to_string()),
        }));
        let mut pipeline = QueryPipeline::new(api);
        let mut session = chatting();

        pipeline.submit("질문", &mut session);
        pipeline.poll(&mut session);

        let last = session.messages().last().unwrap();
        assert!(last.is_error);
        assert_eq!(last.role, MessageRole::Bot);
        assert!(last.content.contains("503"));
        assert!(last.content.contains("준비되지 않았습니다"));
        assert_eq!(pipeline.phase(), QueryPhase::Idle);
    }

    #[test]
    fn test_abandon_returns_to_idle() {
        let api = Arc::new(InstantApi::answering("x"));
        let mut pipeline = QueryPipeline::new(api);
        let mut session = chatting();

        pipeline.submit("질문", &mut session);
        assert!(pipeline.abandon());
        assert!(!pipeline.abandon());
        assert_eq!(pipeline.phase(), QueryPhase::Idle);
        assert!(pipeline.poll(&mut session).is_empty());
        assert_eq!(session.messages().len(), 2);
    }

    #[test]
    fn test_rejection_user_messages() {
        assert_eq!(RejectReason::EmptyQuestion.user_message(), None);
        assert!(RejectReason::Busy.user_message().is_some());
        assert!(RejectReason::NotChatting
            .user_message()
            .unwrap()
            .contains("차량"));
    }
}
