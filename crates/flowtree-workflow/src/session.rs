use chrono::{DateTime, Utc};
use uuid::Uuid;

use flowtree_core::types::{NodeId, OutcomeAnalysis, Phase};

/// State of one user interaction, from trigger to confirm/cancel.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    pub id: String,
    /// Node the outcomes will attach to. `None` creates the first node.
    pub anchor: Option<NodeId>,
    pub topic: String,
    pub questions: Vec<String>,
    pub answer_index: usize,
    pub answers: Vec<String>,
    pub outcome: Option<OutcomeAnalysis>,
    pub phase: Phase,
    /// Started because the tree was empty; the user cannot cancel it while
    /// collecting input.
    pub mandatory: bool,
    pub started_at: DateTime<Utc>,
}

impl WorkflowSession {
    fn new(anchor: Option<NodeId>, topic: String, phase: Phase, mandatory: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            anchor,
            topic,
            questions: Vec::new(),
            answer_index: 0,
            answers: Vec::new(),
            outcome: None,
            phase,
            mandatory,
            started_at: Utc::now(),
        }
    }

    /// Session opened automatically on an empty tree.
    pub fn for_scenario() -> Self {
        Self::new(None, String::new(), Phase::AwaitingScenario { loading: false }, true)
    }

    /// Session opened by clicking an existing node.
    pub fn for_node(anchor: NodeId, label: String) -> Self {
        Self::new(
            Some(anchor),
            label,
            Phase::AwaitingAnswer {
                index: 0,
                loading: true,
            },
            false,
        )
    }

    /// Question currently awaiting an answer.
    pub fn current_question(&self) -> Option<&str> {
        match self.phase {
            Phase::AwaitingAnswer { .. } => self.questions.get(self.answer_index).map(|q| q.as_str()),
            _ => None,
        }
    }

    /// Prompt sent for outcome prediction: the topic followed by every answer.
    pub fn prediction_prompt(&self) -> String {
        format!("{}. Additional context: {}", self.topic, self.answers.join(" "))
    }

    /// Whether a user cancel is refused in the current phase.
    pub fn blocks_cancel(&self) -> bool {
        self.mandatory
            && matches!(
                self.phase,
                Phase::AwaitingScenario { .. } | Phase::AwaitingAnswer { .. }
            )
    }
}
