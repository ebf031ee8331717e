//! Error types for ragprompt
//!
//! Fatal errors abort a run and reach the orchestrator's `Error` state.
//! Refinement and generation errors never abort; they are caught at the
//! refiner boundary, logged, and replaced by the original query.

use serde::Serialize;
use thiserror::Error;

/// Fatal pipeline error
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Empty or whitespace-only query
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Vector store unreachable, misconfigured or timed out
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Prompt template missing a placeholder
    #[error("Template error: {0}")]
    Template(String),

    /// Unreadable or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run interrupted by the user
    #[error("Cancelled while {state}")]
    Cancelled { state: String },

    /// State machine misuse
    #[error("Invalid state transition from {from} on {event}")]
    InvalidTransition { from: String, event: String },
}

impl PipelineError {
    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "InvalidInput",
            PipelineError::RetrievalUnavailable(_) => "RetrievalUnavailable",
            PipelineError::Template(_) => "Template",
            PipelineError::Config(_) => "Config",
            PipelineError::Cancelled { .. } => "Cancelled",
            PipelineError::InvalidTransition { .. } => "InvalidTransition",
        }
    }

    /// Single-line diagnostic for the error channel
    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Machine-readable diagnostic written on fatal errors
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub kind: &'static str,
    pub message: String,
}

impl Diagnostic {
    /// Render as one JSON line
    pub fn to_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"kind\":\"{}\"}}", self.kind))
    }
}

/// Reasons query refinement degraded to the original query
#[derive(Error, Debug)]
pub enum RefinementError {
    #[error("credential {0} is not set")]
    MissingCredential(String),

    #[error("model call failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("response is not valid JSON: {error}; raw response: {raw:?}")]
    MalformedJson { error: String, raw: String },

    #[error("response is not a non-empty list of non-empty strings: {0}")]
    InvalidShape(String),
}

/// Generative model call failures
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
