//! Decoding of raw producer text into a JSON object.

use log::error;
use serde_json::{Map, Value, json};

pub const PARSE_ERROR_TITLE: &str = "Errore di parsing";
pub const PARSE_ERROR_DESCRIPTION: &str = "La risposta AI non è in formato JSON valido";

/// Removes one leading "```json" or "```" fence and one trailing "```".
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parses producer text. Anything that is not a JSON object degrades to a
/// single low-severity parse-error insight.
pub fn parse_response(text: &str) -> Map<String, Value> {
    let body = strip_code_fence(text);
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            error!("Producer response is JSON but not an object: {body}");
            error!("JSON error: expected an object, found {}", kind(&other));
            parse_error_output()
        }
        Err(err) => {
            error!("Failed to parse JSON response: {body}");
            error!("JSON error: {err}");
            parse_error_output()
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn parse_error_output() -> Map<String, Value> {
    let value = json!({
        "insights": [{
            "title": PARSE_ERROR_TITLE,
            "description": PARSE_ERROR_DESCRIPTION,
            "severity": "low"
        }]
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::{Severity, validate_insights};

    #[test]
    fn fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  ```{}```  "), "{}");
        assert_eq!(strip_code_fence("{}"), "{}");
    }

    #[test]
    fn fenced_object_parses() {
        let map = parse_response("```json\n{\"insights\": [], \"recommended_chart\": \"pie\"}\n```");
        assert_eq!(map["recommended_chart"], "pie");
    }

    #[test]
    fn not_json_becomes_single_parse_error_insight() {
        let map = parse_response("not json");
        let insights = validate_insights(&map);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].title, PARSE_ERROR_TITLE);
        assert_eq!(insights[0].description, PARSE_ERROR_DESCRIPTION);
        assert_eq!(insights[0].severity, Severity::Low);
    }

    #[test]
    fn non_object_json_is_a_parse_error() {
        let map = parse_response("[1, 2, 3]");
        assert_eq!(validate_insights(&map)[0].title, PARSE_ERROR_TITLE);
    }
}
