//! Generative model clients used for query refinement
//!
//! Both clients make a single blocking-style request per prompt with an
//! explicit timeout; a timeout surfaces as `GenerationError::Timeout`.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::errors::GenerationError;
use crate::models::types::{
    GeminiRequest, GeminiResponse, OllamaGenerateRequest, OllamaGenerateResponse,
};

/// Default Gemini API endpoint
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Text-in, text-out generative model
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier for logs
    fn name(&self) -> &str;

    /// Generate a completion for a single prompt
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

fn http_client(timeout: Duration) -> Result<Client, GenerationError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(GenerationError::Http)
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout {
            duration_ms: timeout.as_millis() as u64,
        }
    } else {
        GenerationError::Http(err)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(GenerationError::Status { status, body })
}

/// Google Gemini client (generateContent REST API)
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl GeminiGenerator {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.unwrap_or(DEFAULT_GEMINI_URL).trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&GeminiRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let body: GeminiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        body.text().ok_or(GenerationError::EmptyResponse)
    }
}

/// Local Ollama client (non-streaming /api/generate)
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(base_url: Option<&str>, model: &str, timeout: Duration) -> Result<Self, GenerationError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.unwrap_or(DEFAULT_OLLAMA_URL).trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let body: OllamaGenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        if body.response.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_endpoint() {
        let client = GeminiGenerator::new(
            None,
            "gemini-2.0-flash-001",
            "key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.name(), "gemini-2.0-flash-001");
        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-001:generateContent"
        );
    }

    #[test]
    fn test_ollama_trims_trailing_slash() {
        let client =
            OllamaGenerator::new(Some("http://localhost:11434/"), "llama3.2", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
        assert_eq!(client.name(), "llama3.2");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client =
            OllamaGenerator::new(Some("http://127.0.0.1:9"), "llama3.2", Duration::from_secs(2))
                .unwrap();
        assert!(client.generate("hello").await.is_err());
    }
}
