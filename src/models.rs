//! Core data models used throughout ragchat.
//!
//! These types represent the documents, chunks, retrieval results, and chat
//! turns that flow through the indexing and question-answering pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a loaded document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    /// Path relative to the corpus root.
    pub path: String,
    /// File name, used as a display title.
    pub title: String,
    pub content_type: String,
    pub modified_at: DateTime<Utc>,
}

/// A source document loaded from the corpus directory.
///
/// One per input file; immutable after creation and never persisted
/// standalone (only its chunks survive in the index store).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub source: SourceInfo,
}

/// A bounded segment of a document's text, the unit of embedding and
/// retrieval.
///
/// Chunk IDs are deterministic: `{document_id}#{index}`. Offsets are byte
/// offsets into the parent document's text, always on `char` boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub index: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Chunk {
    /// Deterministic chunk ID derived from the parent document and position.
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{document_id}#{index}")
    }
}

/// A retrieved chunk paired with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity against the query vector (higher is more relevant).
    pub score: f32,
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Label used when formatting history into a prompt.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// A single entry in a chat session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}
