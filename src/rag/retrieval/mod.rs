// Retrieval: vector store fan-out and multi-query aggregation
pub mod aggregate;
pub mod engine;

pub use aggregate::{aggregate, DocumentHit, ResultSet};
pub use engine::{RetrievalEngine, SearchParams};
