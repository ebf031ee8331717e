//! Generative model module
//!
//! This module provides the clients the query refiner talks to:
//! - Google Gemini (generateContent REST API, needs an API key)
//! - Local Ollama (/api/generate, no credential)

pub mod client;
pub mod types;

// Re-export key types for convenience
pub use client::{GeminiGenerator, OllamaGenerator, TextGenerator};
