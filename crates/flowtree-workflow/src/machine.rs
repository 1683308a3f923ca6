use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use flowtree_core::config::WorkflowConfig;
use flowtree_core::error::{FlowError, Result};
use flowtree_core::event::EventBus;
use flowtree_core::fallback::{default_questions, fallback_analysis, QUESTION_COUNT};
use flowtree_core::traits::{Clock, PredictionGateway};
use flowtree_core::types::*;
use flowtree_core::wire::validate_questions;
use flowtree_graph::GraphStore;

use crate::session::WorkflowSession;

/// Result of a user action that was legal in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The action moved the workflow.
    Applied,
    /// The action was dropped: a session is already open, nothing is open, or
    /// the session refuses it.
    Ignored,
}

/// Drives one scenario → questions → answers → outcome → graph mutation
/// sequence at a time.
///
/// Phases: `Idle → AwaitingScenario → AwaitingAnswer(0..5) → Predicting →
/// ShowingOutcome → Idle`. Gateway failures never stall the machine: bad or
/// missing questions fall back to a generic set, and failed predictions fall
/// back to a fixed analysis.
pub struct WorkflowMachine {
    store: Arc<GraphStore>,
    predictor: Arc<dyn PredictionGateway>,
    clock: Arc<dyn Clock>,
    event_bus: Arc<EventBus>,
    config: WorkflowConfig,
    session: Option<WorkflowSession>,
    auto_prompt_at: Option<Instant>,
    phase_tx: watch::Sender<Phase>,
}

impl WorkflowMachine {
    pub fn new(
        store: Arc<GraphStore>,
        predictor: Arc<dyn PredictionGateway>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
        config: WorkflowConfig,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            store,
            predictor,
            clock,
            event_bus,
            config,
            session: None,
            auto_prompt_at: None,
            phase_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.as_ref().map(|s| s.phase).unwrap_or(Phase::Idle)
    }

    pub fn session(&self) -> Option<&WorkflowSession> {
        self.session.as_ref()
    }

    /// Receiver that always holds the latest phase.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    fn set_phase(&mut self, phase: Phase) {
        if let Some(session) = self.session.as_mut() {
            session.phase = phase;
        }
        debug!(phase = %phase, "Workflow phase");
        self.phase_tx.send_replace(phase);
        self.event_bus.publish(FlowEvent::PhaseChanged(phase));
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            let elapsed = chrono::Utc::now() - session.started_at;
            debug!(
                session = %session.id,
                elapsed_ms = elapsed.num_milliseconds(),
                "Workflow session closed"
            );
        }
        self.set_phase(Phase::Idle);
        self.refresh();
    }

    fn illegal(&self, action: &str) -> FlowError {
        FlowError::IllegalTransition {
            phase: self.phase().to_string(),
            action: action.to_string(),
        }
    }

    // ── Empty-tree reaction ─────────────────────────────────────

    /// React to a graph change: an empty tree with no open session schedules
    /// the scenario prompt after the configured delay; a non-empty tree
    /// clears any pending prompt.
    pub fn observe_snapshot(&mut self, snapshot: &GraphSnapshot) {
        self.observe_node_count(snapshot.nodes.len());
    }

    /// Same as [`observe_snapshot`](Self::observe_snapshot), for bus events.
    pub fn observe_event(&mut self, event: &FlowEvent) {
        if let FlowEvent::SnapshotUpdated(snapshot) = event {
            self.observe_snapshot(snapshot);
        }
    }

    /// Re-read the store's node count.
    pub fn refresh(&mut self) {
        let count = self.store.node_count();
        self.observe_node_count(count);
    }

    fn observe_node_count(&mut self, count: usize) {
        if count > 0 {
            self.auto_prompt_at = None;
            return;
        }
        if self.session.is_none() && self.auto_prompt_at.is_none() {
            let due = self.clock.now() + self.config.auto_prompt_delay();
            debug!(delay_ms = self.config.auto_prompt_delay_ms, "Empty tree, scenario prompt scheduled");
            self.auto_prompt_at = Some(due);
        }
    }

    /// When the scheduled scenario prompt is due, if any.
    pub fn auto_prompt_due(&self) -> Option<Instant> {
        self.auto_prompt_at
    }

    /// Open the scenario prompt if it is due and still wanted.
    pub fn tick(&mut self) -> Step {
        let Some(due) = self.auto_prompt_at else {
            return Step::Ignored;
        };
        if self.clock.now() < due {
            return Step::Ignored;
        }
        self.auto_prompt_at = None;
        if self.session.is_some() || self.store.node_count() > 0 {
            return Step::Ignored;
        }

        let session = WorkflowSession::for_scenario();
        info!(session = %session.id, "Tree is empty, prompting for a scenario");
        let phase = session.phase;
        self.session = Some(session);
        self.set_phase(phase);
        Step::Applied
    }

    /// Sleep until the scheduled scenario prompt is due, then fire it.
    pub async fn wait_for_auto_prompt(&mut self) -> Step {
        if let Some(due) = self.auto_prompt_at {
            let remaining = due.saturating_duration_since(self.clock.now());
            tokio::time::sleep(remaining).await;
        }
        self.tick()
    }

    // ── User actions ───────────────────────────────────────────

    /// Start a workflow anchored on an existing node.
    pub async fn click_node(&mut self, node_id: &NodeId) -> Result<Step> {
        if let Some(session) = &self.session {
            debug!(session = %session.id, node = %node_id, "Workflow open, click ignored");
            return Ok(Step::Ignored);
        }
        let node = self
            .store
            .node(node_id)
            .ok_or_else(|| FlowError::UnknownNode(node_id.to_string()))?;

        let session = WorkflowSession::for_node(node.id.clone(), node.label.clone());
        info!(session = %session.id, node = %node.id, "Workflow started from node");
        let phase = session.phase;
        self.session = Some(session);
        self.set_phase(phase);

        let questions = self.fetch_questions(&node.label).await;
        self.begin_questions(questions);
        Ok(Step::Applied)
    }

    /// Submit the scenario text for a new first node.
    pub async fn submit_scenario(&mut self, text: &str) -> Result<Step> {
        if self.phase() != (Phase::AwaitingScenario { loading: false }) {
            return Err(self.illegal("submit a scenario"));
        }
        let scenario = text.trim();
        if scenario.is_empty() {
            return Err(FlowError::EmptySubmission);
        }

        if let Some(session) = self.session.as_mut() {
            session.topic = scenario.to_string();
        }
        self.set_phase(Phase::AwaitingScenario { loading: true });

        let questions = self.fetch_questions(scenario).await;
        self.begin_questions(questions);
        Ok(Step::Applied)
    }

    /// Submit the answer to the current question. The fifth answer triggers
    /// the outcome prediction.
    pub async fn submit_answer(&mut self, text: &str) -> Result<Step> {
        let index = match self.phase() {
            Phase::AwaitingAnswer {
                index,
                loading: false,
            } => index,
            _ => return Err(self.illegal("submit an answer")),
        };
        let answer = text.trim();
        if answer.is_empty() {
            return Err(FlowError::EmptySubmission);
        }

        let prompt = match self.session.as_mut() {
            Some(session) => {
                session.answers.push(answer.to_string());
                session.answer_index = index + 1;
                session.prediction_prompt()
            }
            None => return Err(self.illegal("submit an answer")),
        };

        if index + 1 < QUESTION_COUNT {
            self.set_phase(Phase::AwaitingAnswer {
                index: index + 1,
                loading: false,
            });
            return Ok(Step::Applied);
        }

        self.set_phase(Phase::Predicting);
        let analysis = self.fetch_outcome(OutcomeRequest::new(prompt)).await;
        if let Some(session) = self.session.as_mut() {
            session.outcome = Some(analysis);
        }
        self.set_phase(Phase::ShowingOutcome);
        Ok(Step::Applied)
    }

    /// Turn the shown outcome into graph nodes and close the session.
    ///
    /// Exactly one store call is made: a new root with its children when the
    /// session has no anchor, otherwise children under the anchor. The session
    /// is closed even when the store rejects the call.
    pub async fn confirm(&mut self) -> Result<GraphSnapshot> {
        if self.phase() != Phase::ShowingOutcome {
            return Err(self.illegal("create the flow"));
        }
        let Some(session) = self.session.take() else {
            return Err(self.illegal("create the flow"));
        };
        let drafts = session
            .outcome
            .as_ref()
            .map(|o| o.child_drafts())
            .unwrap_or_default();

        let result = match &session.anchor {
            None => self
                .store
                .create_root_with_children(NodeDraft::new(session.topic.clone()), drafts),
            Some(anchor) => self.store.insert_children(anchor, drafts),
        };
        match &result {
            Ok(snapshot) => info!(
                session = %session.id,
                nodes = snapshot.nodes.len(),
                "Outcome added to tree"
            ),
            Err(e) => warn!(session = %session.id, error = %e, "Outcome rejected by store"),
        }

        self.session = Some(session);
        self.end_session();
        result
    }

    /// Discard the shown outcome.
    pub fn start_over(&mut self) -> Result<Step> {
        if self.phase() != Phase::ShowingOutcome {
            return Err(self.illegal("start over"));
        }
        self.end_session();
        Ok(Step::Applied)
    }

    /// Close the open session without touching the graph. A session opened
    /// because the tree was empty cannot be cancelled while collecting input.
    pub fn cancel(&mut self) -> Step {
        match &self.session {
            None => Step::Ignored,
            Some(session) if session.blocks_cancel() => {
                debug!(session = %session.id, "First node is mandatory, cancel ignored");
                Step::Ignored
            }
            Some(_) => {
                self.end_session();
                Step::Applied
            }
        }
    }

    // ── Gateway calls ──────────────────────────────────────────

    fn begin_questions(&mut self, questions: Vec<String>) {
        if let Some(session) = self.session.as_mut() {
            session.questions = questions;
            session.answer_index = 0;
            session.answers.clear();
        }
        self.set_phase(Phase::AwaitingAnswer {
            index: 0,
            loading: false,
        });
    }

    async fn fetch_questions(&self, topic: &str) -> Vec<String> {
        let timeout = self.config.gateway_timeout();
        let result = match tokio::time::timeout(timeout, self.predictor.ask_questions(topic)).await {
            Ok(Ok(questions)) => validate_questions(questions),
            Ok(Err(e)) => Err(as_collaborator_fault(e)),
            Err(_) => Err(FlowError::GatewayUnavailable(format!(
                "no questions within {}s",
                timeout.as_secs()
            ))),
        };

        match result {
            Ok(questions) => questions,
            Err(e) => {
                warn!(error = %e, "Using default questions");
                default_questions()
            }
        }
    }

    async fn fetch_outcome(&self, request: OutcomeRequest) -> OutcomeAnalysis {
        let timeout = self.config.gateway_timeout();
        let result = match tokio::time::timeout(timeout, self.predictor.predict_outcomes(request)).await {
            Ok(Ok(analysis)) if analysis.has_no_outcomes() => Err(FlowError::MalformedOutcomeAnalysis(
                "no outcomes in any category".into(),
            )),
            Ok(Ok(analysis)) => Ok(analysis),
            Ok(Err(e)) => Err(as_collaborator_fault(e)),
            Err(_) => Err(FlowError::GatewayUnavailable(format!(
                "no prediction within {}s",
                timeout.as_secs()
            ))),
        };

        match result {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "Using fallback outcome analysis");
                fallback_analysis()
            }
        }
    }
}

fn as_collaborator_fault(e: FlowError) -> FlowError {
    match e {
        FlowError::MalformedQuestionSet(_)
        | FlowError::MalformedOutcomeAnalysis(_)
        | FlowError::GatewayUnavailable(_) => e,
        other => FlowError::GatewayUnavailable(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use flowtree_core::fallback::default_questions;
    use flowtree_graph::LayoutEngine;
    use flowtree_test_utils::{
        five_questions, sample_analysis, sample_snapshot, ManualClock, MemoryStore, MockPredictor,
        Reply,
    };

    struct Harness {
        machine: WorkflowMachine,
        store: Arc<GraphStore>,
        predictor: Arc<MockPredictor>,
        clock: Arc<ManualClock>,
        persistence: Arc<MemoryStore>,
    }

    fn harness(snapshot: GraphSnapshot) -> Harness {
        let bus = Arc::new(EventBus::default());
        let persistence = Arc::new(MemoryStore::with_snapshot(snapshot.clone()));
        let store = Arc::new(GraphStore::new(
            snapshot,
            persistence.clone(),
            LayoutEngine::default(),
            bus.clone(),
        ));
        let predictor = Arc::new(MockPredictor::new());
        let clock = Arc::new(ManualClock::new());
        let machine = WorkflowMachine::new(
            store.clone(),
            predictor.clone(),
            clock.clone(),
            bus,
            WorkflowConfig::default(),
        );
        Harness {
            machine,
            store,
            predictor,
            clock,
            persistence,
        }
    }

    async fn answer_all(machine: &mut WorkflowMachine) {
        for i in 0..QUESTION_COUNT {
            let step = machine.submit_answer(&format!("answer {}", i + 1)).await.unwrap();
            assert_eq!(step, Step::Applied);
        }
    }

    #[tokio::test]
    async fn empty_tree_prompts_after_delay() {
        let mut h = harness(GraphSnapshot::default());
        h.machine.refresh();
        assert!(h.machine.auto_prompt_due().is_some());

        assert_eq!(h.machine.tick(), Step::Ignored);
        assert!(h.machine.phase().is_idle());

        h.clock.advance(Duration::from_millis(100));
        assert_eq!(h.machine.tick(), Step::Applied);
        assert_eq!(h.machine.phase(), Phase::AwaitingScenario { loading: false });
        assert!(h.machine.auto_prompt_due().is_none());
    }

    #[tokio::test]
    async fn non_empty_tree_never_prompts() {
        let mut h = harness(sample_snapshot());
        h.machine.refresh();
        assert!(h.machine.auto_prompt_due().is_none());
        h.clock.advance(Duration::from_secs(5));
        assert_eq!(h.machine.tick(), Step::Ignored);
    }

    #[tokio::test]
    async fn first_node_flow_creates_root_and_children() {
        let mut h = harness(GraphSnapshot::default());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.predictor.push_outcome(Reply::Ok(sample_analysis()));
        h.machine.refresh();
        h.clock.advance(Duration::from_millis(100));
        h.machine.tick();

        h.machine.submit_scenario("  Should I change jobs?  ").await.unwrap();
        assert_eq!(h.predictor.topics(), vec!["Should I change jobs?"]);
        assert_eq!(h.machine.phase(), Phase::AwaitingAnswer { index: 0, loading: false });
        assert_eq!(h.machine.session().unwrap().current_question(), Some("Question 1?"));

        answer_all(&mut h.machine).await;
        assert_eq!(h.machine.phase(), Phase::ShowingOutcome);
        assert_eq!(
            h.predictor.requests()[0].prompt,
            "Should I change jobs?. Additional context: answer 1 answer 2 answer 3 answer 4 answer 5"
        );

        let snapshot = h.machine.confirm().await.unwrap();
        assert!(h.machine.phase().is_idle());
        assert!(h.machine.session().is_none());

        assert_eq!(snapshot.nodes.len(), 5);
        assert_eq!(snapshot.nodes[0].label, "Should I change jobs?");
        assert_eq!(snapshot.nodes[0].kind, NodeKind::Root);
        let labels: Vec<&str> = snapshot.nodes[1..].iter().map(|n| n.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Higher salary", "New skills", "Longer commute", "Different team culture"]
        );
        let emphasized: Vec<bool> = snapshot.edges.iter().map(|e| e.emphasized).collect();
        assert_eq!(emphasized, vec![true, true, false, false]);

        h.store.flush().await;
        assert_eq!(h.persistence.saved().len(), 1);
    }

    #[tokio::test]
    async fn click_attaches_outcomes_to_node() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.predictor.push_outcome(Reply::Ok(sample_analysis()));

        let step = h.machine.click_node(&NodeId::from("3")).await.unwrap();
        assert_eq!(step, Step::Applied);
        assert_eq!(h.predictor.topics(), vec!["Longer commute"]);
        answer_all(&mut h.machine).await;
        let snapshot = h.machine.confirm().await.unwrap();

        let children = snapshot.children_of(&NodeId::from("3"));
        assert_eq!(children.len(), 4);
        assert_eq!(snapshot.node(&NodeId::from("3")).unwrap().kind, NodeKind::Branch);
        assert!(snapshot.edges.iter().any(|e| e.id.as_str() == "e3-4"));
    }

    #[tokio::test]
    async fn four_questions_fall_back_to_defaults() {
        let mut h = harness(sample_snapshot());
        let four: Vec<String> = five_questions().into_iter().take(4).collect();
        h.predictor.push_questions(Reply::Ok(four));

        h.machine.click_node(&NodeId::from("1")).await.unwrap();
        let session = h.machine.session().unwrap();
        assert_eq!(session.questions.len(), 5);
        assert_eq!(session.questions, default_questions());
        assert_eq!(h.machine.phase(), Phase::AwaitingAnswer { index: 0, loading: false });
    }

    #[tokio::test]
    async fn gateway_error_falls_back_to_defaults() {
        let mut h = harness(sample_snapshot());
        h.predictor
            .push_questions(Reply::Err(FlowError::LlmRequest("HTTP 503".into())));
        h.machine.click_node(&NodeId::from("1")).await.unwrap();
        assert_eq!(h.machine.session().unwrap().questions, default_questions());
    }

    #[tokio::test(start_paused = true)]
    async fn question_timeout_falls_back_to_defaults() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Hang);
        h.machine.click_node(&NodeId::from("1")).await.unwrap();
        assert_eq!(h.machine.session().unwrap().questions, default_questions());
    }

    #[tokio::test]
    async fn failed_prediction_shows_fallback() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.predictor
            .push_outcome(Reply::Err(FlowError::GatewayUnavailable("connection reset".into())));

        h.machine.click_node(&NodeId::from("2")).await.unwrap();
        answer_all(&mut h.machine).await;

        assert_eq!(h.machine.phase(), Phase::ShowingOutcome);
        let outcome = h.machine.session().unwrap().outcome.clone().unwrap();
        assert!(!outcome.positive.is_empty());
        assert!(!outcome.negative.is_empty());
        assert!(!outcome.mixed.is_empty());
        assert_eq!(outcome, fallback_analysis());
    }

    #[tokio::test]
    async fn empty_prediction_shows_fallback() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.predictor.push_outcome(Reply::Ok(OutcomeAnalysis::default()));
        h.machine.click_node(&NodeId::from("2")).await.unwrap();
        answer_all(&mut h.machine).await;
        assert_eq!(
            h.machine.session().unwrap().outcome.clone().unwrap(),
            fallback_analysis()
        );
    }

    #[tokio::test]
    async fn blank_answer_is_rejected() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.machine.click_node(&NodeId::from("1")).await.unwrap();

        let err = h.machine.submit_answer("   ").await.unwrap_err();
        assert!(matches!(err, FlowError::EmptySubmission));
        assert_eq!(h.machine.phase(), Phase::AwaitingAnswer { index: 0, loading: false });
        assert!(h.machine.session().unwrap().answers.is_empty());

        h.machine.submit_answer(" first ").await.unwrap();
        assert_eq!(h.machine.session().unwrap().answers, vec!["first"]);
        assert_eq!(h.machine.phase(), Phase::AwaitingAnswer { index: 1, loading: false });
    }

    #[tokio::test]
    async fn blank_scenario_is_rejected() {
        let mut h = harness(GraphSnapshot::default());
        h.machine.refresh();
        h.clock.advance(Duration::from_secs(1));
        h.machine.tick();
        let err = h.machine.submit_scenario("\n\t ").await.unwrap_err();
        assert!(matches!(err, FlowError::EmptySubmission));
        assert_eq!(h.machine.phase(), Phase::AwaitingScenario { loading: false });
        assert!(h.predictor.topics().is_empty());
    }

    #[tokio::test]
    async fn second_trigger_is_ignored() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.machine.click_node(&NodeId::from("2")).await.unwrap();

        let step = h.machine.click_node(&NodeId::from("3")).await.unwrap();
        assert_eq!(step, Step::Ignored);
        assert_eq!(h.machine.session().unwrap().anchor, Some(NodeId::from("2")));
        assert_eq!(h.predictor.topics().len(), 1);
    }

    #[tokio::test]
    async fn click_unknown_node_fails() {
        let mut h = harness(sample_snapshot());
        let err = h.machine.click_node(&NodeId::from("99")).await.unwrap_err();
        assert!(matches!(err, FlowError::UnknownNode(_)));
        assert!(h.machine.phase().is_idle());
    }

    #[tokio::test]
    async fn cancel_discards_session_without_store_call() {
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.machine.click_node(&NodeId::from("2")).await.unwrap();
        h.machine.submit_answer("one").await.unwrap();

        assert_eq!(h.machine.cancel(), Step::Applied);
        assert!(h.machine.phase().is_idle());
        assert_eq!(h.store.snapshot(), sample_snapshot());
        h.store.flush().await;
        assert!(h.persistence.saved().is_empty());
    }

    #[tokio::test]
    async fn mandatory_session_refuses_cancel() {
        let mut h = harness(GraphSnapshot::default());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.machine.refresh();
        h.clock.advance(Duration::from_millis(150));
        h.machine.tick();

        assert_eq!(h.machine.cancel(), Step::Ignored);
        assert_eq!(h.machine.phase(), Phase::AwaitingScenario { loading: false });

        h.machine.submit_scenario("Quit my job?").await.unwrap();
        assert_eq!(h.machine.cancel(), Step::Ignored);
        assert_eq!(h.machine.phase(), Phase::AwaitingAnswer { index: 0, loading: false });
    }

    #[tokio::test]
    async fn start_over_on_empty_tree_reschedules_prompt() {
        let mut h = harness(GraphSnapshot::default());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.predictor.push_outcome(Reply::Ok(sample_analysis()));
        h.machine.refresh();
        h.clock.advance(Duration::from_millis(100));
        h.machine.tick();
        h.machine.submit_scenario("Adopt a dog?").await.unwrap();
        answer_all(&mut h.machine).await;

        assert_eq!(h.machine.start_over().unwrap(), Step::Applied);
        assert!(h.machine.phase().is_idle());
        assert!(h.machine.auto_prompt_due().is_some());
        assert_eq!(h.store.node_count(), 0);

        h.clock.advance(Duration::from_millis(100));
        assert_eq!(h.machine.tick(), Step::Applied);
    }

    #[tokio::test]
    async fn actions_out_of_phase_are_illegal() {
        let mut h = harness(sample_snapshot());
        assert!(matches!(
            h.machine.submit_answer("hi").await,
            Err(FlowError::IllegalTransition { .. })
        ));
        assert!(matches!(
            h.machine.submit_scenario("hi").await,
            Err(FlowError::IllegalTransition { .. })
        ));
        assert!(matches!(h.machine.confirm().await, Err(FlowError::IllegalTransition { .. })));
        assert!(matches!(h.machine.start_over(), Err(FlowError::IllegalTransition { .. })));
        assert_eq!(h.machine.cancel(), Step::Ignored);
    }

    #[tokio::test]
    async fn phase_watch_follows_transitions() {
        let mut h = harness(sample_snapshot());
        let rx = h.machine.subscribe_phase();
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.machine.click_node(&NodeId::from("1")).await.unwrap();
        assert_eq!(*rx.borrow(), Phase::AwaitingAnswer { index: 0, loading: false });
        h.machine.cancel();
        assert_eq!(*rx.borrow(), Phase::Idle);
    }

    #[tokio::test]
    async fn confirm_closes_session_when_anchor_vanished() {
        // A session anchored on a node the store does not know about.
        let mut h = harness(sample_snapshot());
        h.predictor.push_questions(Reply::Ok(five_questions()));
        h.predictor.push_outcome(Reply::Ok(sample_analysis()));
        h.machine.click_node(&NodeId::from("2")).await.unwrap();
        answer_all(&mut h.machine).await;
        if let Some(session) = h.machine.session.as_mut() {
            session.anchor = Some(NodeId::from("77"));
        }

        let err = h.machine.confirm().await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidParent(_)));
        assert!(h.machine.phase().is_idle());
        assert_eq!(h.store.snapshot(), sample_snapshot());
    }
}
