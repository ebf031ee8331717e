//! Wire types for the generative model APIs

use serde::{Deserialize, Serialize};

/// Gemini generateContent request
#[derive(Debug, Clone, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiContent {
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Gemini generateContent response
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: GeminiContent,
}

impl GeminiRequest {
    /// Single-turn user prompt
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
                role: Some("user".to_string()),
            }],
        }
    }
}

impl GeminiResponse {
    /// Concatenated text of the first candidate
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Ollama generate request
#[derive(Debug, Clone, Serialize)]
pub struct OllamaGenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// Ollama generate response (non-streaming)
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaGenerateResponse {
    #[serde(default)]
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_request_shape() {
        let request = GeminiRequest::from_prompt("hello");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_gemini_response_joins_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"[\"a\","},{"text":"\"b\"]"}]}}]}"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().as_deref(), Some(r#"["a","b"]"#));
    }

    #[test]
    fn test_gemini_response_without_candidates() {
        let response: GeminiResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(response.text().is_none());
    }
}
