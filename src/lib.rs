//! ragchat — retrieval-augmented question answering over a local document
//! corpus.
//!
//! The pipeline: load documents from a corpus directory, split them into
//! overlapping chunks, embed the chunks, and index the vectors. At query
//! time the question is embedded with the same model, the most similar
//! chunks are retrieved, and an LLM synthesizes an answer from that context
//! plus the bounded conversation history.

pub mod chat;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexer;
pub mod llm;
pub mod loader;
pub mod memory;
pub mod models;
pub mod retriever;
pub mod synthesizer;

pub use error::{RagError, Result};
