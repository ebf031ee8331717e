//! Retrieval backends
//!
//! Components:
//! - Embedding: query text to vector, matching the index's model
//! - Vector DB: nearest-neighbour search over the pre-built collection

pub mod embedding;
pub mod vector_db;

pub use embedding::Embedder;
pub use vector_db::{DistanceMetric, Metadata, QdrantStore, QueryResult, VectorStore};
