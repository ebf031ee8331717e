//! Vector store client

pub mod manager;

pub use manager::{DistanceMetric, Metadata, QdrantStore, QueryResult, VectorStore};
