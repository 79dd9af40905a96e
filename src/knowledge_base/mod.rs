//! Clients for the managed knowledge base: retrieval, text generation, and ingestion admin.

pub mod admin;
pub mod generation;
pub mod retrieval;

pub use admin::{
    BedrockIngestionAdmin, DataSourceSpec, IngestionAdmin, IngestionJob, IngestionJobStatus,
};
pub use generation::{BedrockTextGenerator, GenerationParams, TextGenerator};
pub use retrieval::{KnowledgeBaseRetriever, PassageMetadata, RetrievalResult, Retriever};
