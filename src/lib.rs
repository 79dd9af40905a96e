#![deny(missing_docs)]

//! Core library for City Desk: document ingestion, grounded question answering, and the API-key gate.

/// HTTP routing for the query handler and access gate.
pub mod api;
/// API-key authorization and policy documents.
pub mod auth;
/// Signed HTTP transport for AWS services.
pub mod aws;
/// Environment-driven configuration.
pub mod config;
/// Upload, registration, and indexing of local documents.
pub mod ingest;
/// Retrieval, generation, and ingestion-admin clients.
pub mod knowledge_base;
/// Structured logging and tracing setup.
pub mod logging;
/// Question answering over retrieved passages.
pub mod query;
/// Object storage for uploaded documents.
pub mod storage;
