//! Pulling structured JSON out of free-form model output.

use serde::de::DeserializeOwned;

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Extract and deserialize a JSON object from model output.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(&extract_json_object(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"category": "TASK"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_markdown_block() {
        let input = "```json\n{\"passed\": true}\n```";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.contains("passed"));
    }

    #[test]
    fn extract_json_from_bare_fence() {
        let input = "Result:\n```\n{\"dept_id\": \"LIBRARY\"}\n```";
        assert_eq!(extract_json_object(input), r#"{"dept_id": "LIBRARY"}"#);
    }

    #[test]
    fn extract_json_embedded_in_text() {
        let input = "My analysis: {\"status\": \"COMPLETED\"} done.";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.ends_with('}'));
    }

    #[test]
    fn parse_json_reports_garbage() {
        #[derive(serde::Deserialize)]
        struct Sample {
            #[allow(dead_code)]
            status: String,
        }
        assert!(parse_json::<Sample>("no json here").is_err());
    }
}
