//! ragprompt - retrieval-augmented prompt construction
//!
//! Turns one free-text request into a code-generation prompt grounded in
//! API documentation pulled from a pre-built vector index.
//!
//! # Architecture
//!
//! - **rag**: refinement, retrieval, aggregation, assembly and the state machine
//! - **models**: generative model clients used for query refinement
//! - **memory**: embedding models and the vector store client
//! - **cli**: arguments and TOML configuration
//! - **telemetry**: logging setup
//! - **doctor**: health checks
//! - **execution**: shared run logic for the binary

pub mod errors;
pub mod cli;
pub mod models;
pub mod memory;
pub mod rag;
pub mod telemetry;
pub mod doctor;
pub mod execution;

// Re-export commonly used types
pub use errors::{PipelineError, Result};
pub use rag::{CancelFlag, RAGPipeline, RAGResult};
