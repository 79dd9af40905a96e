//! Question answering over the knowledge base.

pub mod citations;
pub mod prompt;
mod service;

pub use citations::{Citation, DisplayCitation, format_citations};
pub use service::{
    DEFAULT_TOP_K, NO_CONTEXT_ANSWER, NO_RESULTS_ANSWER, QueryApi, QueryError, QueryResponse,
    QueryService,
};
