//! Safe defaults substituted when the prediction collaborator fails or
//! returns something unusable.

use crate::types::OutcomeAnalysis;

/// Number of clarifying questions in every workflow.
pub const QUESTION_COUNT: usize = 5;

const DEFAULT_QUESTIONS: [&str; QUESTION_COUNT] = [
    "How are you feeling about this situation right now?",
    "What led to this scenario - can you share some background context?",
    "What would an ideal outcome look like for you?",
    "What are the biggest challenges or obstacles you're currently facing?",
    "What kind of support or guidance would be most helpful for you right now?",
];

/// The generic question set used when a generated one is unusable.
pub fn default_questions() -> Vec<String> {
    DEFAULT_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// The outcome analysis used when prediction fails. All three outcome
/// categories are non-empty so the workflow can always build children.
pub fn fallback_analysis() -> OutcomeAnalysis {
    OutcomeAnalysis {
        summary: "Analysis of potential outcomes for your decision.".into(),
        positive: vec![
            "You may experience personal growth and learning from taking action".into(),
            "This decision could lead to new opportunities and connections".into(),
            "Successfully navigating this choice may boost your confidence".into(),
        ],
        negative: vec![
            "There may be unexpected challenges or setbacks along the way".into(),
            "The decision might require more time, energy, or resources than anticipated".into(),
            "Some relationships or current situations might be affected".into(),
        ],
        mixed: vec![
            "The outcome will likely be a mix of positive and challenging experiences".into(),
            "You may find that the result is different from what you initially expected".into(),
            "The decision may lead to other choices and decisions down the road".into(),
        ],
        considerations: vec![
            "Consider your values and long-term goals when making this decision".into(),
            "Think about what support systems or resources you might need".into(),
            "Evaluate your risk tolerance and backup plans".into(),
        ],
        recommendation: "Take time to reflect on your priorities, seek advice from trusted \
                         sources, and consider starting with small steps to test your \
                         decision before fully committing."
            .into(),
    }
}
