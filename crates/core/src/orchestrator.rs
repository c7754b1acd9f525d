//! The practice session orchestrator.
//!
//! Owns scenario/difficulty selection, the session lifecycle, and the
//! turn-by-turn exchange with the remote practice service. All state
//! transitions happen on `&mut self` in reaction to a single event at a
//! time; suspension only occurs at the catalog fetch and the remote-call
//! awaits. Precondition violations (empty utterance, missing selection,
//! send while a send is outstanding) are silent no-ops, never errors.

use crate::backend::PracticeBackend;
use crate::catalog::{self, CategorizedCatalog, DifficultyLevel, ScenarioRecord};
use crate::session::{
    FAILED_EXCHANGE_REPLY, FALLBACK_WELCOME, Message, Session, SessionId, SessionStatus,
    scenario_welcome,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the orchestrator is in the selection/session flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Choosing a scenario and difficulty; no session exists.
    Selecting,
    /// A session start is in flight. The start affordance is inert.
    Starting,
    /// A session is active and exchanging messages.
    InSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExchangeState {
    Idle,
    Sending,
}

/// The assistant side of one exchange, as surfaced to observers.
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    pub message: Message,
    pub feedback: Option<String>,
    pub metrics: Option<BTreeMap<String, f64>>,
    /// True when the remote call failed and `message` is the fixed
    /// fallback reply.
    pub degraded: bool,
}

pub struct PracticeOrchestrator {
    backend: Arc<dyn PracticeBackend>,
    catalog: CategorizedCatalog,
    scenario: Option<ScenarioRecord>,
    difficulty: Option<DifficultyLevel>,
    phase: Phase,
    session: Option<Session>,
    history: Vec<Message>,
    exchange: ExchangeState,
    next_local_id: u64,
}

impl PracticeOrchestrator {
    pub fn new(backend: Arc<dyn PracticeBackend>) -> Self {
        Self {
            backend,
            catalog: CategorizedCatalog::new(),
            scenario: None,
            difficulty: None,
            phase: Phase::Selecting,
            session: None,
            history: Vec::new(),
            exchange: ExchangeState::Idle,
            next_local_id: 1,
        }
    }

    /// Fetches the scenario catalog. On failure the catalog is simply
    /// empty until the next call; selection has no options but nothing
    /// blocks.
    pub async fn load_catalog(&mut self) -> &CategorizedCatalog {
        match self.backend.fetch_scenarios().await {
            Ok(catalog) => self.catalog = catalog,
            Err(e) => {
                warn!(error = %e, "Scenario catalog unavailable; selection will be empty");
                self.catalog = CategorizedCatalog::new();
            }
        }
        &self.catalog
    }

    pub fn catalog(&self) -> &CategorizedCatalog {
        &self.catalog
    }

    pub fn scenario_by_id(&self, id: &str) -> Option<ScenarioRecord> {
        catalog::find_scenario(&self.catalog, id).cloned()
    }

    pub fn selected_scenario(&self) -> Option<&ScenarioRecord> {
        self.scenario.as_ref()
    }

    pub fn selected_difficulty(&self) -> Option<&DifficultyLevel> {
        self.difficulty.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Whether the start affordance should be live.
    pub fn can_start(&self) -> bool {
        self.scenario.is_some() && self.difficulty.is_some() && self.phase != Phase::Starting
    }

    /// Records a scenario choice. A previously chosen difficulty is kept:
    /// the level applies equally to any scenario, so re-selection never
    /// forces the user to re-pick it.
    pub fn choose_scenario(&mut self, record: ScenarioRecord) -> bool {
        if self.phase != Phase::Selecting {
            debug!(scenario = %record.id, "Ignoring scenario choice outside selection");
            return false;
        }
        self.scenario = Some(record);
        true
    }

    /// Records a difficulty choice. Only meaningful once a scenario is
    /// chosen.
    pub fn choose_difficulty(&mut self, level: DifficultyLevel) -> bool {
        if self.phase != Phase::Selecting || self.scenario.is_none() {
            debug!(difficulty = %level.id, "Ignoring difficulty choice without a scenario");
            return false;
        }
        self.difficulty = Some(level);
        true
    }

    /// Opens a session for the current selection.
    ///
    /// Rejected (no-op, `false`) unless both scenario and difficulty are
    /// chosen and no start is already in flight. If a session is still
    /// active it is closed first; the old identifier is never leaked. When
    /// the remote start fails, the session degrades to a locally
    /// identified one so the experience is never blocked by an outage.
    pub async fn start_session(&mut self) -> bool {
        if self.phase == Phase::Starting {
            debug!("Ignoring session start while one is already in flight");
            return false;
        }
        let (Some(scenario), Some(difficulty)) = (self.scenario.clone(), self.difficulty.clone())
        else {
            debug!("Ignoring session start with incomplete selection");
            return false;
        };

        if self.session.is_some() {
            self.close_current().await;
        }

        self.phase = Phase::Starting;
        let (id, welcome) = match self.backend.start_session(&scenario.id, &difficulty).await {
            Ok(greeting) => {
                let welcome = greeting
                    .welcome
                    .unwrap_or_else(|| scenario_welcome(&scenario.title));
                (SessionId::Remote(greeting.session_id), welcome)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    scenario = %scenario.id,
                    "Remote session start failed; continuing with a local session"
                );
                let id = SessionId::Local(self.next_local_id);
                self.next_local_id += 1;
                (id, FALLBACK_WELCOME.to_string())
            }
        };

        info!(session = %id, scenario = %scenario.id, difficulty = %difficulty.id, "Practice session started");
        self.session = Some(Session {
            id,
            scenario_id: scenario.id.clone(),
            difficulty,
            status: SessionStatus::Active,
        });
        self.history.clear();
        self.history.push(Message::assistant(welcome));
        self.exchange = ExchangeState::Idle;
        self.phase = Phase::InSession;
        true
    }

    /// Sends one user utterance through the exchange pipeline.
    ///
    /// Returns `None` when the send is rejected: empty/whitespace text, no
    /// active session, or a prior exchange still in flight. An accepted
    /// send always appends the user message first, then exactly one
    /// assistant message, even when the remote call fails.
    pub async fn send_message(&mut self, text: &str) -> Option<AssistantTurn> {
        let utterance = text.trim();
        if utterance.is_empty() {
            debug!("Ignoring empty utterance");
            return None;
        }
        let Some(session) = self
            .session
            .as_ref()
            .filter(|s| s.status == SessionStatus::Active)
        else {
            debug!("Ignoring utterance without an active session");
            return None;
        };
        if self.exchange == ExchangeState::Sending {
            debug!("Ignoring utterance while a prior exchange is in flight");
            return None;
        }

        let session_id = session.id.to_string();
        let utterance = utterance.to_string();
        self.exchange = ExchangeState::Sending;
        // Optimistic append: the user's own words survive a failed call.
        self.history.push(Message::user(utterance.clone()));

        let turn = match self.backend.send_message(&session_id, &utterance).await {
            Ok(reply) => AssistantTurn {
                message: Message::assistant(reply.message),
                feedback: reply.feedback,
                metrics: reply.metrics,
                degraded: false,
            },
            Err(e) => {
                warn!(error = %e, session = %session_id, "Exchange failed; appending fallback reply");
                AssistantTurn {
                    message: Message::assistant(FAILED_EXCHANGE_REPLY),
                    feedback: None,
                    metrics: None,
                    degraded: true,
                }
            }
        };

        self.history.push(turn.message.clone());
        self.exchange = ExchangeState::Idle;
        Some(turn)
    }

    /// Ends the active session and returns to an empty selection.
    /// Idempotent: ending with no session is a no-op.
    pub async fn end_session(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.close_current().await;
        self.scenario = None;
        self.difficulty = None;
        self.phase = Phase::Selecting;
    }

    async fn close_current(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.status = SessionStatus::Completed;
            // Local sessions never existed remotely, so there is nothing
            // to acknowledge.
            if !session.id.is_local() {
                if let Err(e) = self.backend.end_session(&session.id.to_string()).await {
                    warn!(error = %e, session = %session.id, "Remote session end not acknowledged");
                }
            }
            info!(session = %session.id, "Practice session closed");
        }
        self.history.clear();
        self.exchange = ExchangeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        CounterpartReply, MockPracticeBackend, SessionGreeting, StubPracticeBackend,
    };
    use crate::session::MessageRole;
    use anyhow::anyhow;

    fn cold_call_record() -> ScenarioRecord {
        ScenarioRecord {
            id: "cold-1".to_string(),
            title: "First Time Contact".to_string(),
            description: "Practice initial contact.".to_string(),
            category: "Cold Calling".to_string(),
        }
    }

    fn select_and_ready(orchestrator: &mut PracticeOrchestrator) {
        assert!(orchestrator.choose_scenario(cold_call_record()));
        assert!(orchestrator.choose_difficulty(DifficultyLevel::beginner()));
    }

    fn stub_orchestrator() -> PracticeOrchestrator {
        PracticeOrchestrator::new(Arc::new(StubPracticeBackend::new()))
    }

    #[tokio::test]
    async fn test_full_flow_against_reference_catalog() {
        let mut orchestrator = stub_orchestrator();
        let catalog = orchestrator.load_catalog().await;
        assert!(catalog.contains_key("Cold Calling"));

        let record = orchestrator.scenario_by_id("cold-1").unwrap();
        assert!(orchestrator.choose_scenario(record));
        assert!(orchestrator.choose_difficulty(DifficultyLevel::beginner()));
        assert!(orchestrator.start_session().await);

        let history = orchestrator.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert!(history[0].content.contains("First Time Contact"));

        let turn = orchestrator.send_message("Hi there").await.unwrap();
        assert!(!turn.degraded);
        let history = orchestrator.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Message::user("Hi there"));
        assert_eq!(history[2].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_start_requires_complete_selection() {
        let mut orchestrator = stub_orchestrator();
        orchestrator.load_catalog().await;

        // Nothing chosen.
        assert!(!orchestrator.start_session().await);
        assert!(orchestrator.session().is_none());

        // Scenario only.
        assert!(orchestrator.choose_scenario(cold_call_record()));
        assert!(!orchestrator.can_start());
        assert!(!orchestrator.start_session().await);
        assert!(orchestrator.session().is_none());
        assert!(orchestrator.history().is_empty());
    }

    #[tokio::test]
    async fn test_difficulty_requires_scenario_first() {
        let mut orchestrator = stub_orchestrator();
        assert!(!orchestrator.choose_difficulty(DifficultyLevel::beginner()));
        assert!(orchestrator.selected_difficulty().is_none());
    }

    #[tokio::test]
    async fn test_reselecting_scenario_preserves_difficulty() {
        let mut orchestrator = stub_orchestrator();
        orchestrator.load_catalog().await;
        select_and_ready(&mut orchestrator);

        let other = orchestrator.scenario_by_id("obj-1").unwrap();
        assert!(orchestrator.choose_scenario(other));
        assert_eq!(
            orchestrator.selected_scenario().map(|s| s.id.as_str()),
            Some("obj-1")
        );
        // The chosen level is kept across re-selection.
        assert_eq!(
            orchestrator.selected_difficulty(),
            Some(&DifficultyLevel::beginner())
        );
        assert!(orchestrator.can_start());
    }

    #[tokio::test]
    async fn test_double_start_yields_one_session_and_one_welcome() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session()
            .times(2)
            .returning(|_, _| {
                Ok(SessionGreeting {
                    session_id: "remote-1".to_string(),
                    welcome: Some("Welcome!".to_string()),
                })
            });
        mock.expect_end_session().times(1).returning(|_| Ok(()));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);

        assert!(orchestrator.start_session().await);
        // A second start (double-click) restarts rather than stacking: the
        // first session is closed, and history holds exactly one welcome.
        assert!(orchestrator.start_session().await);

        assert!(orchestrator.session().is_some());
        assert_eq!(orchestrator.history().len(), 1);
        assert_eq!(orchestrator.history()[0].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_n_exchanges_leave_2n_plus_1_messages() {
        let mut orchestrator = stub_orchestrator();
        orchestrator.load_catalog().await;
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);

        let n = 4;
        for i in 0..n {
            let turn = orchestrator
                .send_message(&format!("Message {}", i))
                .await
                .unwrap();
            assert_eq!(turn.message.role, MessageRole::Assistant);
        }

        let history = orchestrator.history();
        assert_eq!(history.len(), 2 * n + 1);
        assert_eq!(history[0].role, MessageRole::Assistant);
        for pair in 0..n {
            assert_eq!(history[1 + 2 * pair].role, MessageRole::User);
            assert_eq!(history[2 + 2 * pair].role, MessageRole::Assistant);
        }
    }

    #[tokio::test]
    async fn test_rejected_sends_issue_no_remote_call() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session().times(1).returning(|_, _| {
            Ok(SessionGreeting {
                session_id: "remote-1".to_string(),
                welcome: None,
            })
        });
        // The gate must reject before the backend is ever touched.
        mock.expect_send_message().times(0);

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));

        // No session at all.
        assert!(orchestrator.send_message("hello").await.is_none());
        assert!(orchestrator.history().is_empty());

        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);
        let baseline = orchestrator.history().len();

        assert!(orchestrator.send_message("").await.is_none());
        assert!(orchestrator.send_message("   ").await.is_none());
        assert_eq!(orchestrator.history().len(), baseline);
    }

    #[tokio::test]
    async fn test_failed_exchange_appends_exactly_one_fallback_reply() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session().times(1).returning(|_, _| {
            Ok(SessionGreeting {
                session_id: "remote-1".to_string(),
                welcome: Some("Welcome!".to_string()),
            })
        });
        mock.expect_send_message()
            .times(1)
            .returning(|_, _| Err(anyhow!("backend unreachable")));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);

        let turn = orchestrator.send_message("Hi there").await.unwrap();
        assert!(turn.degraded);
        assert_eq!(turn.message.content, FAILED_EXCHANGE_REPLY);

        let history = orchestrator.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Message::user("Hi there"));
        assert_eq!(history[2], Message::assistant(FAILED_EXCHANGE_REPLY));

        // The session stays usable for later turns.
        assert!(orchestrator.session().is_some());
        assert_eq!(orchestrator.phase(), Phase::InSession);
    }

    #[tokio::test]
    async fn test_remote_start_failure_degrades_to_local_session() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session()
            .times(1)
            .returning(|_, _| Err(anyhow!("connection refused")));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);

        let session = orchestrator.session().unwrap();
        assert!(session.id.is_local());
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(orchestrator.history().len(), 1);
        assert_eq!(orchestrator.history()[0], Message::assistant(FALLBACK_WELCOME));
    }

    #[tokio::test]
    async fn test_local_session_ids_stay_unique() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session()
            .times(2)
            .returning(|_, _| Err(anyhow!("down")));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);
        let first = orchestrator.session().unwrap().id.clone();
        assert!(orchestrator.start_session().await);
        let second = orchestrator.session().unwrap().id.clone();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session().times(1).returning(|_, _| {
            Ok(SessionGreeting {
                session_id: "remote-1".to_string(),
                welcome: None,
            })
        });
        // Closing twice must reach the backend exactly once.
        mock.expect_end_session().times(1).returning(|_| Ok(()));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);

        orchestrator.end_session().await;
        orchestrator.end_session().await;

        assert!(orchestrator.session().is_none());
        assert!(orchestrator.history().is_empty());
        assert!(orchestrator.selected_scenario().is_none());
        assert!(orchestrator.selected_difficulty().is_none());
        assert_eq!(orchestrator.phase(), Phase::Selecting);
    }

    #[tokio::test]
    async fn test_end_session_cleans_up_even_when_ack_fails() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session().times(1).returning(|_, _| {
            Ok(SessionGreeting {
                session_id: "remote-1".to_string(),
                welcome: None,
            })
        });
        mock.expect_end_session()
            .times(1)
            .returning(|_| Err(anyhow!("timeout")));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);
        orchestrator.end_session().await;

        assert!(orchestrator.session().is_none());
        assert!(orchestrator.history().is_empty());
    }

    #[tokio::test]
    async fn test_ending_local_session_skips_remote_ack() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session()
            .times(1)
            .returning(|_, _| Err(anyhow!("down")));
        mock.expect_end_session().times(0);

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);
        orchestrator.end_session().await;
        assert!(orchestrator.session().is_none());
    }

    #[tokio::test]
    async fn test_catalog_failure_yields_empty_selection_set() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_fetch_scenarios()
            .times(1)
            .returning(|| Err(anyhow!("503")));

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        let catalog = orchestrator.load_catalog().await;
        assert!(catalog.is_empty());
        assert!(orchestrator.scenario_by_id("cold-1").is_none());
    }

    #[tokio::test]
    async fn test_selection_is_locked_while_in_session() {
        let mut orchestrator = stub_orchestrator();
        orchestrator.load_catalog().await;
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);

        let other = orchestrator.scenario_by_id("obj-1").unwrap();
        assert!(!orchestrator.choose_scenario(other));
        assert!(!orchestrator.choose_difficulty(DifficultyLevel::advanced()));
        assert_eq!(
            orchestrator.selected_scenario().map(|s| s.id.as_str()),
            Some("cold-1")
        );
    }

    #[tokio::test]
    async fn test_feedback_and_metrics_pass_through_to_observers() {
        let mut mock = MockPracticeBackend::new();
        mock.expect_start_session().times(1).returning(|_, _| {
            Ok(SessionGreeting {
                session_id: "remote-1".to_string(),
                welcome: None,
            })
        });
        mock.expect_send_message().times(1).returning(|_, _| {
            Ok(CounterpartReply {
                message: "Tell me more.".to_string(),
                feedback: Some("Good open question.".to_string()),
                metrics: Some(BTreeMap::from([("confidence".to_string(), 0.9)])),
            })
        });

        let mut orchestrator = PracticeOrchestrator::new(Arc::new(mock));
        select_and_ready(&mut orchestrator);
        assert!(orchestrator.start_session().await);

        let turn = orchestrator.send_message("What matters to you?").await.unwrap();
        assert_eq!(turn.feedback.as_deref(), Some("Good open question."));
        assert_eq!(turn.metrics.unwrap()["confidence"], 0.9);
        // Feedback never gates further sends.
        assert!(orchestrator.send_message("").await.is_none());
    }
}
