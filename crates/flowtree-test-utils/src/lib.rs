//! Test doubles for the flowtree gateway traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use flowtree_core::error::{FlowError, Result};
use flowtree_core::traits::{Clock, PersistenceGateway, PredictionGateway};
use flowtree_core::types::*;

/// In-memory [`PersistenceGateway`] that records every save.
pub struct MemoryStore {
    current: Mutex<GraphSnapshot>,
    saved: Mutex<Vec<GraphSnapshot>>,
    fail_saves: AtomicBool,
    fail_loads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_snapshot(GraphSnapshot::default())
    }

    pub fn with_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            current: Mutex::new(snapshot),
            saved: Mutex::new(Vec::new()),
            fail_saves: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail with `PersistenceWriteFailed`.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent loads fail with `PersistenceReadFailed`.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Every successfully saved snapshot, oldest first.
    pub fn saved(&self) -> Vec<GraphSnapshot> {
        self.saved.lock().unwrap().clone()
    }

    /// The stored snapshot.
    pub fn current(&self) -> GraphSnapshot {
        self.current.lock().unwrap().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceGateway for MemoryStore {
    fn load(&self) -> BoxFuture<'_, Result<GraphSnapshot>> {
        Box::pin(async move {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(FlowError::PersistenceReadFailed("mock load failure".into()));
            }
            Ok(self.current())
        })
    }

    fn save(&self, snapshot: GraphSnapshot) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(FlowError::PersistenceWriteFailed("mock save failure".into()));
            }
            *self.current.lock().unwrap() = snapshot.clone();
            self.saved.lock().unwrap().push(snapshot);
            Ok(())
        })
    }
}

/// Scripted reply for a [`MockPredictor`] call.
pub enum Reply<T> {
    Ok(T),
    Err(FlowError),
    /// Never resolves; exercises caller timeouts.
    Hang,
}

/// Scripted [`PredictionGateway`]. Replies are consumed in order; when a
/// queue runs dry the predictor answers with `GatewayUnavailable`.
pub struct MockPredictor {
    questions: Mutex<VecDeque<Reply<Vec<String>>>>,
    outcomes: Mutex<VecDeque<Reply<OutcomeAnalysis>>>,
    topics: Mutex<Vec<String>>,
    requests: Mutex<Vec<OutcomeRequest>>,
}

impl MockPredictor {
    pub fn new() -> Self {
        Self {
            questions: Mutex::new(VecDeque::new()),
            outcomes: Mutex::new(VecDeque::new()),
            topics: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_questions(&self, reply: Reply<Vec<String>>) -> &Self {
        self.questions.lock().unwrap().push_back(reply);
        self
    }

    pub fn push_outcome(&self, reply: Reply<OutcomeAnalysis>) -> &Self {
        self.outcomes.lock().unwrap().push_back(reply);
        self
    }

    /// Topics passed to `ask_questions`, in call order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }

    /// Requests passed to `predict_outcomes`, in call order.
    pub fn requests(&self) -> Vec<OutcomeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockPredictor {
    fn default() -> Self {
        Self::new()
    }
}

async fn resolve<T>(reply: Option<Reply<T>>) -> Result<T> {
    match reply {
        Some(Reply::Ok(value)) => Ok(value),
        Some(Reply::Err(e)) => Err(e),
        Some(Reply::Hang) => futures::future::pending().await,
        None => Err(FlowError::GatewayUnavailable("no scripted reply".into())),
    }
}

impl PredictionGateway for MockPredictor {
    fn ask_questions(&self, topic: &str) -> BoxFuture<'_, Result<Vec<String>>> {
        self.topics.lock().unwrap().push(topic.to_string());
        let reply = self.questions.lock().unwrap().pop_front();
        Box::pin(resolve(reply))
    }

    fn predict_outcomes(&self, request: OutcomeRequest) -> BoxFuture<'_, Result<OutcomeAnalysis>> {
        self.requests.lock().unwrap().push(request);
        let reply = self.outcomes.lock().unwrap().pop_front();
        Box::pin(resolve(reply))
    }
}

/// [`Clock`] that only moves when told to.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}

// ── Fixtures ─────────────────────────────────────────────────────

/// Five distinct questions.
pub fn five_questions() -> Vec<String> {
    (1..=5).map(|i| format!("Question {}?", i)).collect()
}

/// An analysis with two positive, one negative and one mixed outcome.
pub fn sample_analysis() -> OutcomeAnalysis {
    OutcomeAnalysis {
        summary: "A reasonable bet.".into(),
        positive: vec!["Higher salary".into(), "New skills".into()],
        negative: vec!["Longer commute".into()],
        mixed: vec!["Different team culture".into()],
        considerations: vec!["Savings runway".into()],
        recommendation: "Negotiate a start date.".into(),
    }
}

/// Root "1" with two leaf children "2" and "3".
pub fn sample_snapshot() -> GraphSnapshot {
    let node = |id: &str, label: &str, x: f64, y: f64, kind: NodeKind| Node {
        id: NodeId::from(id),
        position: Position::new(x, y),
        label: label.into(),
        kind,
        tone: None,
    };
    GraphSnapshot {
        nodes: vec![
            node("1", "Should I change jobs?", 400.0, 50.0, NodeKind::Root),
            node("2", "Higher salary", 300.0, 200.0, NodeKind::Leaf),
            node("3", "Longer commute", 500.0, 200.0, NodeKind::Leaf),
        ],
        edges: vec![
            Edge::new(NodeId::from("1"), NodeId::from("2"), true),
            Edge::new(NodeId::from("1"), NodeId::from("3"), false),
        ],
    }
}

/// `sample_snapshot` in the JSON shape written by the file store.
pub fn sample_snapshot_json() -> serde_json::Value {
    serde_json::to_value(sample_snapshot()).expect("snapshot serializes")
}
