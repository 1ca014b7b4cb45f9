//! Core library: document extraction, chunking, embedding, vector search,
//! retrieval, answer synthesis, and template generation.

pub mod answer;
pub mod chunker;
pub mod config;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod retrieval;
pub mod store;
pub mod templates;
pub mod vectorstore;
