use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Structural errors
    #[error("Invalid parent node: {0}")]
    InvalidParent(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unknown edge: {0}")]
    UnknownEdge(String),

    #[error("Graph already has a root node")]
    GraphNotEmpty,

    // Collaborator faults
    #[error("Malformed question set: {0}")]
    MalformedQuestionSet(String),

    #[error("Malformed outcome analysis: {0}")]
    MalformedOutcomeAnalysis(String),

    #[error("Prediction gateway unavailable: {0}")]
    GatewayUnavailable(String),

    // Persistence errors
    #[error("Persistence write failed: {0}")]
    PersistenceWriteFailed(String),

    #[error("Persistence read failed: {0}")]
    PersistenceReadFailed(String),

    // Workflow input errors
    #[error("Empty submission")]
    EmptySubmission,

    #[error("Illegal transition: cannot {action} while {phase}")]
    IllegalTransition { phase: String, action: String },

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Structural errors are caller bugs: the attempted mutation was rejected
    /// and the graph is unchanged.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FlowError::InvalidParent(_)
                | FlowError::UnknownNode(_)
                | FlowError::UnknownEdge(_)
                | FlowError::GraphNotEmpty
        )
    }

    /// Collaborator faults are recovered locally with a fallback value.
    pub fn is_collaborator_fault(&self) -> bool {
        matches!(
            self,
            FlowError::MalformedQuestionSet(_)
                | FlowError::MalformedOutcomeAnalysis(_)
                | FlowError::GatewayUnavailable(_)
                | FlowError::LlmRequest(_)
                | FlowError::LlmParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_structural_errors() {
        assert!(FlowError::InvalidParent("9".into()).is_structural());
        assert!(FlowError::GraphNotEmpty.is_structural());
        assert!(!FlowError::EmptySubmission.is_structural());
    }

    #[test]
    fn classifies_collaborator_faults() {
        assert!(FlowError::MalformedQuestionSet("4 items".into()).is_collaborator_fault());
        assert!(FlowError::GatewayUnavailable("timeout".into()).is_collaborator_fault());
        assert!(!FlowError::PersistenceWriteFailed("disk".into()).is_collaborator_fault());
    }

    #[test]
    fn illegal_transition_message() {
        let err = FlowError::IllegalTransition {
            phase: "idle".into(),
            action: "submit an answer".into(),
        };
        assert_eq!(err.to_string(), "Illegal transition: cannot submit an answer while idle");
    }
}
