use std::sync::OnceLock;

use log::warn;
use regex::Regex;
use serde_json::Value;

use crate::ai::prompt::LessonComponentKind;
use crate::error::{PipelineError, PipelineResult};
use crate::models::lesson::{ContentDepth, Diagram};

/// Known fenced-diagram kinds the normalizer accepts verbatim; anything
/// else gets coerced to "text".
const KNOWN_DIAGRAM_KINDS: &[&str] = &["mermaid", "plantuml", "ascii"];

/// Turns a raw, possibly-noisy AI completion into a validated fragment of
/// `LessonComponents`. Tolerant of surrounding prose around
/// the JSON payload (some providers wrap JSON in markdown fences even in
/// JSON mode) but strict about the shape once extracted.
pub struct ResponseParser;

impl ResponseParser {
    /// Extracts the first top-level JSON object or array from `raw`,
    /// tolerating a leading/trailing ```json fence or stray commentary.
    pub fn extract_json(raw: &str) -> PipelineResult<Value> {
        let candidate = Self::strip_fences(raw.trim());
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }

        let start = candidate.find(['{', '[']);
        let end = candidate.rfind(['}', ']']);
        match (start, end) {
            (Some(s), Some(e)) if e >= s => serde_json::from_str(&candidate[s..=e])
                .map_err(|err| PipelineError::ParseFailure { component: "json".into(), reason: err.to_string() }),
            _ => Err(PipelineError::ParseFailure {
                component: "json".into(),
                reason: "no JSON object or array found in response".into(),
            }),
        }
    }

    /// Strips a leading/trailing ```json or bare ``` fence. Providers vary
    /// in how much whitespace they leave around the fence markers, so this
    /// is a regex rather than a fixed prefix/suffix strip.
    fn strip_fences(s: &str) -> &str {
        static FENCE: OnceLock<Regex> = OnceLock::new();
        let re = FENCE.get_or_init(|| Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap());
        re.captures(s).and_then(|c| c.get(1)).map(|m| m.as_str()).unwrap_or(s)
    }

    /// Validates and normalizes one component's JSON against its expected
    /// schema, applying the list-length caps and complexity adjustments
    /// from that component's expected schema.
    pub fn parse_component(
        kind: LessonComponentKind,
        raw: &str,
        depth: ContentDepth,
    ) -> PipelineResult<ParsedComponent> {
        let value = Self::extract_json(raw)?;

        match kind {
            LessonComponentKind::Exercises => Self::parse_exercises(&value, depth),
            LessonComponentKind::Quiz => Self::parse_quiz(&value),
            LessonComponentKind::Diagrams => Self::parse_diagrams(&value),
            LessonComponentKind::Summary
            | LessonComponentKind::VideoStudyGuide
            | LessonComponentKind::LongFormBody => Self::parse_prose(&value, kind),
        }
    }

    fn parse_exercises(value: &Value, depth: ContentDepth) -> PipelineResult<ParsedComponent> {
        let items = value
            .get("exercises")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::ParseFailure { component: "exercises".into(), reason: "missing \"exercises\" array".into() })?;

        let cap = depth.exercise_cap();
        if items.len() > cap {
            warn!("parser: exercises list of {} capped to {cap} for depth {:?}", items.len(), depth);
        }

        let capped: Vec<Value> = items.iter().take(cap).cloned().collect();
        for item in &capped {
            if item.get("prompt").and_then(Value::as_str).is_none() {
                return Err(PipelineError::ParseFailure { component: "exercises".into(), reason: "exercise missing \"prompt\"".into() });
            }
        }

        Ok(ParsedComponent::Exercises(capped))
    }

    fn parse_quiz(value: &Value) -> PipelineResult<ParsedComponent> {
        let items = value
            .get("quiz")
            .and_then(Value::as_array)
            .ok_or_else(|| PipelineError::ParseFailure { component: "quiz".into(), reason: "missing \"quiz\" array".into() })?;

        for item in items {
            let choices = item.get("choices").and_then(Value::as_array);
            if choices.map(|c| c.len()).unwrap_or(0) < 2 {
                return Err(PipelineError::ParseFailure { component: "quiz".into(), reason: "quiz question needs at least two choices".into() });
            }
            if item.get("answer_index").and_then(Value::as_u64).is_none() {
                return Err(PipelineError::ParseFailure { component: "quiz".into(), reason: "quiz question missing \"answer_index\"".into() });
            }
        }

        Ok(ParsedComponent::Quiz(items.to_vec()))
    }

    /// Diagrams arrive in at least four shapes in the wild: a bare array,
    /// a `{"diagrams": [...]}` wrapper, a single
    /// object, or a raw string. All are coerced to `[{type, code}, ...]`.
    fn parse_diagrams(value: &Value) -> PipelineResult<ParsedComponent> {
        let items: Vec<Value> = match value {
            Value::Array(items) => items.clone(),
            Value::Object(map) if map.contains_key("diagrams") => map
                .get("diagrams")
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| PipelineError::ParseFailure { component: "diagrams".into(), reason: "\"diagrams\" is not an array".into() })?,
            Value::Object(_) => vec![value.clone()],
            Value::String(_) => vec![value.clone()],
            _ => {
                return Err(PipelineError::ParseFailure { component: "diagrams".into(), reason: "unrecognized diagrams shape".into() });
            }
        };

        let mut diagrams = Vec::with_capacity(items.len());
        for item in items {
            let (kind, code) = match &item {
                Value::String(s) => ("text".to_string(), s.clone()),
                Value::Object(_) => {
                    let kind = item.get("type").and_then(Value::as_str).unwrap_or("text").to_lowercase();
                    let code = item
                        .get("code")
                        .and_then(Value::as_str)
                        .ok_or_else(|| PipelineError::ParseFailure { component: "diagrams".into(), reason: "diagram missing \"code\"".into() })?
                        .to_string();
                    (kind, code)
                }
                _ => {
                    return Err(PipelineError::ParseFailure { component: "diagrams".into(), reason: "diagram entry is neither object nor string".into() });
                }
            };

            let kind = if KNOWN_DIAGRAM_KINDS.contains(&kind.as_str()) { kind } else { "text".to_string() };
            diagrams.push(Diagram { kind, code });
        }

        Ok(ParsedComponent::Diagrams(diagrams))
    }

    fn parse_prose(value: &Value, kind: LessonComponentKind) -> PipelineResult<ParsedComponent> {
        let introduction = value.get("introduction").and_then(Value::as_str).map(str::to_string);
        let body = value
            .get("body")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::ParseFailure { component: kind.name().into(), reason: "missing \"body\" string".into() })?
            .to_string();

        Ok(ParsedComponent::Prose { introduction, body })
    }
}

#[derive(Debug, Clone)]
pub enum ParsedComponent {
    Exercises(Vec<Value>),
    Quiz(Vec<Value>),
    Diagrams(Vec<Diagram>),
    Prose { introduction: Option<String>, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_wrapped_in_markdown_fence_and_prose() {
        let raw = "Sure, here you go:\n```json\n{\"body\": \"hello\"}\n```\nHope that helps!";
        let value = ResponseParser::extract_json(raw).unwrap();
        assert_eq!(value.get("body").unwrap().as_str().unwrap(), "hello");
    }

    #[test]
    fn exercises_are_capped_at_the_depth_specific_limit() {
        let exercises: Vec<Value> = (0..12)
            .map(|i| serde_json::json!({"prompt": format!("q{i}"), "solution": "s", "difficulty": "easy"}))
            .collect();
        let raw = serde_json::json!({ "exercises": exercises }).to_string();

        let parsed = ResponseParser::parse_component(LessonComponentKind::Exercises, &raw, ContentDepth::Foundational).unwrap();
        match parsed {
            ParsedComponent::Exercises(items) => assert_eq!(items.len(), 5),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_diagram_kind_is_coerced_to_text() {
        let raw = serde_json::json!({ "diagrams": [{"type": "graphviz", "code": "digraph {}"}] }).to_string();
        let parsed = ResponseParser::parse_component(LessonComponentKind::Diagrams, &raw, ContentDepth::Comprehensive).unwrap();
        match parsed {
            ParsedComponent::Diagrams(diagrams) => {
                assert_eq!(diagrams.len(), 1);
                assert_eq!(diagrams[0].kind, "text");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn diagrams_normalize_from_bare_array_single_object_and_raw_string() {
        let bare_array = serde_json::json!([{"type": "mermaid", "code": "graph TD; A-->B"}]).to_string();
        match ResponseParser::parse_component(LessonComponentKind::Diagrams, &bare_array, ContentDepth::Foundational).unwrap() {
            ParsedComponent::Diagrams(d) => assert_eq!(d.len(), 1),
            _ => panic!("wrong variant"),
        }

        let single_object = serde_json::json!({"type": "ascii", "code": "+---+"}).to_string();
        match ResponseParser::parse_component(LessonComponentKind::Diagrams, &single_object, ContentDepth::Foundational).unwrap() {
            ParsedComponent::Diagrams(d) => assert_eq!(d[0].kind, "ascii"),
            _ => panic!("wrong variant"),
        }

        let raw_string = serde_json::json!("just a flowchart in prose").to_string();
        match ResponseParser::parse_component(LessonComponentKind::Diagrams, &raw_string, ContentDepth::Foundational).unwrap() {
            ParsedComponent::Diagrams(d) => {
                assert_eq!(d.len(), 1);
                assert_eq!(d[0].kind, "text");
                assert_eq!(d[0].code, "just a flowchart in prose");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn quiz_requires_at_least_two_choices() {
        let raw = serde_json::json!({ "quiz": [{"question": "q", "choices": ["only one"], "answer_index": 0}] }).to_string();
        let result = ResponseParser::parse_component(LessonComponentKind::Quiz, &raw, ContentDepth::Foundational);
        assert!(result.is_err());
    }

    #[test]
    fn missing_body_on_prose_component_is_a_parse_failure() {
        let raw = serde_json::json!({ "introduction": "intro only" }).to_string();
        let result = ResponseParser::parse_component(LessonComponentKind::Summary, &raw, ContentDepth::Foundational);
        assert!(result.is_err());
    }
}
