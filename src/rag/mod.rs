// Retrieval-augmented prompt construction
//
// Components:
// - Refiner: rewrite the request into technical search queries
// - Retrieval: multi-query vector search, merge and rank
// - Context: render the final prompt from a fixed template
// - State: the run's state machine and cancellation flag
// - Pipeline: end-to-end orchestration

pub mod refiner;
pub mod retrieval;
pub mod context;
pub mod state;
pub mod pipeline;

// Re-export key types
pub use refiner::{QueryRefiner, RefinedQueries};
pub use retrieval::{aggregate, DocumentHit, RetrievalEngine, SearchParams};
pub use context::{assemble, PromptTemplate};
pub use state::{CancelFlag, PipelineState};
pub use pipeline::{RAGPipeline, RAGResult};
