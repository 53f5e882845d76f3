//! Prompt construction and response parsing
//!
//! All prompts the query pipeline sends to the LLM live here, next to
//! the parsers for the answers they elicit, so prompt and parser stay
//! in sync.

use crate::domain::concept::LearningPath;
use crate::domain::staging::ConceptAnalysis;
use crate::error::{Error, Result};

use super::types::Message;

/// Upper bound on concepts taken from one extraction response
pub const MAX_EXTRACTED_CONCEPTS: usize = 5;

/// Build the concept extraction conversation
pub fn extraction_messages(question: &str) -> Vec<Message> {
    vec![
        Message::system(
            "You identify the mathematical concepts a student must understand \
             to answer a question. Respond with ONLY a comma-separated list of \
             concept names, most central first, at most five. Use short \
             canonical names like \"derivatives\" or \"chain rule\". \
             No explanations, no numbering.",
        ),
        Message::user(question.to_string()),
    ]
}

/// Parse a comma-separated concept list from an extraction response
///
/// Tolerates newline-separated lists and leading bullets. Output names
/// are lower-cased and trimmed, deduplicated in request order, and
/// capped at [`MAX_EXTRACTED_CONCEPTS`].
pub fn parse_concept_list(response: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut concepts = Vec::new();

    for raw in response.split([',', '\n']) {
        let name = raw
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim()
            .trim_end_matches('.')
            .trim()
            .to_lowercase();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.clone()) {
            concepts.push(name);
        }
        if concepts.len() >= MAX_EXTRACTED_CONCEPTS {
            break;
        }
    }

    concepts
}

/// Build the explanation synthesis conversation
///
/// The user message carries the question, the learning path rendered as
/// "A → B → C", and numbered context sections.
pub fn synthesis_messages(
    question: &str,
    path: &LearningPath,
    context_snippets: &[String],
) -> Vec<Message> {
    let mut prompt = format!("Question: {}", question);

    if !path.is_empty() {
        prompt.push_str(&format!("\n\nLearning path: {}", path.display_sequence()));
    }

    for (i, snippet) in context_snippets.iter().enumerate() {
        prompt.push_str(&format!("\n\nContext {}: {}", i + 1, snippet));
    }

    vec![
        Message::system(
            "You are a patient, encouraging math tutor. Explain the answer to \
             the student's question step by step. Follow the learning path \
             order when one is given, building from prerequisites toward the \
             target concepts. Ground the explanation in the provided context \
             sections when they are relevant, and keep the tone supportive.",
        ),
        Message::user(prompt),
    ]
}

/// Build the candidate-concept analysis conversation
///
/// Asks the LLM to judge whether a name mentioned in a question is a
/// real, learnable concept worth adding to the graph.
pub fn analysis_messages(concept_name: &str, source_question: &str) -> Vec<Message> {
    vec![
        Message::system(
            "You curate a mathematics concept graph. Given a candidate \
             concept name and the question it appeared in, decide whether it \
             is a genuine, learnable mathematical concept. Respond with ONLY \
             a JSON object with these fields: \
             is_learnable (boolean), description (string), \
             suggested_prerequisites (array of concept names), \
             confidence (number 0-1), difficulty_level (integer 1-5), \
             category (string), reasoning (string).",
        ),
        Message::user(format!(
            "Candidate concept: {}\nQuestion it appeared in: {}",
            concept_name, source_question
        )),
    ]
}

/// Parse an analysis response into a [`ConceptAnalysis`]
///
/// Strips markdown code fences and any prose around the JSON object
/// before parsing.
pub fn parse_concept_analysis(response: &str) -> Result<ConceptAnalysis> {
    let json = extract_json_object(response).ok_or_else(|| {
        Error::LlmError(format!(
            "Analysis response contained no JSON object: {}",
            truncate(response, 120)
        ))
    })?;

    serde_json::from_str(json)
        .map_err(|e| Error::LlmError(format!("Failed to parse analysis response: {}", e)))
}

/// Find the outermost JSON object in a response
fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max_chars).collect();
        format!("{}...", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_concept_list_basic() {
        let concepts = parse_concept_list("derivatives, limits, chain rule");
        assert_eq!(concepts, vec!["derivatives", "limits", "chain rule"]);
    }

    #[test]
    fn test_parse_concept_list_bullets_and_newlines() {
        let concepts = parse_concept_list("- derivatives\n- limits\n- functions.");
        assert_eq!(concepts, vec!["derivatives", "limits", "functions"]);
    }

    #[test]
    fn test_parse_concept_list_lowercases_and_deduplicates() {
        let concepts = parse_concept_list("Limits, limits, LIMITS, Derivatives");
        assert_eq!(concepts, vec!["limits", "derivatives"]);
    }

    #[test]
    fn test_parse_concept_list_caps_length() {
        let concepts = parse_concept_list("a, b, c, d, e, f, g");
        assert_eq!(concepts.len(), MAX_EXTRACTED_CONCEPTS);
    }

    #[test]
    fn test_parse_concept_list_empty_response() {
        assert!(parse_concept_list("").is_empty());
        assert!(parse_concept_list(" , , ").is_empty());
    }

    #[test]
    fn test_synthesis_prompt_includes_path_and_context() {
        use crate::domain::concept::{PathNode, PathRole};

        let path = LearningPath {
            nodes: vec![
                PathNode {
                    concept_id: "limits".into(),
                    name: "Limits".into(),
                    description: String::new(),
                    difficulty_level: 1,
                    role: PathRole::Prerequisite,
                },
                PathNode {
                    concept_id: "derivatives".into(),
                    name: "Derivatives".into(),
                    description: String::new(),
                    difficulty_level: 2,
                    role: PathRole::Target,
                },
            ],
        };
        let context = vec!["The limit of f(x)...".to_string(), "Slope of tangent...".to_string()];

        let messages = synthesis_messages("What is a derivative?", &path, &context);
        let user = &messages[1].content;

        assert!(user.contains("Question: What is a derivative?"));
        assert!(user.contains("Learning path: Limits → Derivatives"));
        assert!(user.contains("Context 1: The limit of f(x)..."));
        assert!(user.contains("Context 2: Slope of tangent..."));
    }

    #[test]
    fn test_synthesis_prompt_omits_empty_path() {
        let messages = synthesis_messages("What is 2+2?", &LearningPath::new(), &[]);
        assert!(!messages[1].content.contains("Learning path:"));
    }

    #[test]
    fn test_parse_analysis_plain_json() {
        let response = r#"{"is_learnable": true, "description": "d", "confidence": 0.9, "difficulty_level": 3}"#;
        let analysis = parse_concept_analysis(response).unwrap();
        assert!(analysis.is_learnable);
        assert_eq!(analysis.difficulty_level, 3);
    }

    #[test]
    fn test_parse_analysis_fenced_json() {
        let response = "Here is my verdict:\n```json\n{\"is_learnable\": false, \"reasoning\": \"typo\"}\n```";
        let analysis = parse_concept_analysis(response).unwrap();
        assert!(!analysis.is_learnable);
        assert_eq!(analysis.reasoning, "typo");
    }

    #[test]
    fn test_parse_analysis_no_json() {
        assert!(parse_concept_analysis("I cannot judge that.").is_err());
    }
}
