//! Turn raw model text into questions and outcome analyses.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use flowtree_core::error::{FlowError, Result};
use flowtree_core::fallback::QUESTION_COUNT;
use flowtree_core::types::OutcomeAnalysis;
use flowtree_core::wire::{analysis_from_value, questions_from_value, validate_questions};

/// Remove a surrounding Markdown code fence (with or without a language tag).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    let body = match rest.find('\n') {
        Some(nl) if !rest[..nl].contains('{') && !rest[..nl].contains('[') => &rest[nl + 1..],
        _ => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Parse a question reply: JSON `{"questions": [...]}` first, then any five
/// lines that contain a question mark.
pub fn parse_questions(text: &str) -> Result<Vec<String>> {
    let json_err = match serde_json::from_str::<Value>(strip_code_fence(text)) {
        Ok(value) => match value.get("questions") {
            Some(questions) => match questions_from_value(questions) {
                Ok(q) => return Ok(q),
                Err(e) => e.to_string(),
            },
            None => "reply has no questions field".to_string(),
        },
        Err(e) => e.to_string(),
    };

    let extracted = extract_question_lines(text);
    if extracted.len() == QUESTION_COUNT {
        return validate_questions(extracted);
    }
    Err(FlowError::MalformedQuestionSet(format!(
        "{}; found {} question lines",
        json_err,
        extracted.len()
    )))
}

fn list_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"^\s*(?:\d+[.)]?\s*|[-*•]\s*)").expect("valid list marker pattern"))
}

/// Up to five non-blank lines containing `?`, with list numbering, bullets
/// and double quotes removed.
fn extract_question_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty() && line.contains('?'))
        .map(|line| {
            let line = list_marker().replace(line, "");
            line.replace('"', "").trim().trim_end_matches(',').trim().to_string()
        })
        .filter(|q| !q.is_empty())
        .take(QUESTION_COUNT)
        .collect()
}

/// Parse an outcome reply. The three outcome categories must be present and
/// be arrays; the remaining fields are optional.
pub fn parse_analysis(text: &str) -> Result<OutcomeAnalysis> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| FlowError::MalformedOutcomeAnalysis(e.to_string()))?;

    for field in ["positive_outcomes", "negative_outcomes", "neutral_mixed_outcomes"] {
        if !value.get(field).is_some_and(Value::is_array) {
            return Err(FlowError::MalformedOutcomeAnalysis(format!(
                "{} missing or not an array",
                field
            )));
        }
    }
    analysis_from_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_JSON: &str = r#"{"questions": ["One?", "Two?", "Three?", "Four?", "Five?"]}"#;

    #[test]
    fn strips_json_fence() {
        let fenced = format!("```json\n{}\n```", FIVE_JSON);
        assert_eq!(strip_code_fence(&fenced), FIVE_JSON);
        let bare = format!("```\n{}\n```", FIVE_JSON);
        assert_eq!(strip_code_fence(&bare), FIVE_JSON);
        assert_eq!(strip_code_fence(FIVE_JSON), FIVE_JSON);
    }

    #[test]
    fn parses_fenced_questions() {
        let fenced = format!("```json\n{}\n```", FIVE_JSON);
        let questions = parse_questions(&fenced).unwrap();
        assert_eq!(questions, vec!["One?", "Two?", "Three?", "Four?", "Five?"]);
    }

    #[test]
    fn extracts_numbered_lines() {
        let text = "Here are some questions:\n\
                    1. How do you feel about it?\n\
                    2) What led here?\n\
                    - \"What would success look like?\"\n\
                    * What stands in the way?\n\
                    5. Who can help you?\n\
                    6. One too many?";
        let questions = parse_questions(text).unwrap();
        assert_eq!(
            questions,
            vec![
                "How do you feel about it?",
                "What led here?",
                "What would success look like?",
                "What stands in the way?",
                "Who can help you?",
            ]
        );
    }

    #[test]
    fn too_few_questions_is_malformed() {
        let text = r#"{"questions": ["Only?", "Two?"]}"#;
        assert!(matches!(
            parse_questions(text),
            Err(FlowError::MalformedQuestionSet(_))
        ));
        assert!(matches!(
            parse_questions("I cannot help with that."),
            Err(FlowError::MalformedQuestionSet(_))
        ));
    }

    #[test]
    fn parses_analysis_with_missing_optional_fields() {
        let text = r#"```json
        {"positive_outcomes": ["Growth"], "negative_outcomes": [], "neutral_mixed_outcomes": ["Mixed"]}
        ```"#;
        let analysis = parse_analysis(text).unwrap();
        assert_eq!(analysis.positive, vec!["Growth"]);
        assert!(analysis.negative.is_empty());
        assert!(analysis.summary.is_empty());
    }

    #[test]
    fn analysis_without_categories_is_malformed() {
        let text = r#"{"analysis_summary": "hm", "positive_outcomes": "not a list"}"#;
        assert!(matches!(
            parse_analysis(text),
            Err(FlowError::MalformedOutcomeAnalysis(_))
        ));
        assert!(matches!(
            parse_analysis("sure! here you go"),
            Err(FlowError::MalformedOutcomeAnalysis(_))
        ));
    }
}
