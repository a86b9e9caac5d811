//! Query-time retrieval: embed a question and rank indexed chunks.

use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::ScoredChunk;

/// Retrieves the most relevant chunks for a query.
///
/// Holds the index and the same embedding provider that built it; querying
/// with a different provider would produce incomparable vectors.
pub struct Retriever {
    index: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        index: Arc<VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self { index, provider, top_k }
    }

    /// Embed `query` and return up to `top_k` chunks, best first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let vector = self.provider.embed(query).await?;
        Ok(self.index.search(&vector, self.top_k))
    }

    /// Human-readable retrieval diagnostics for a query.
    ///
    /// Shows each retrieved chunk's ID, score, source document, and a short
    /// text preview. Diagnostics never fail: an embedding error produces an
    /// explanatory line instead.
    pub async fn debug_context(&self, query: &str) -> String {
        let results = match self.retrieve(query).await {
            Ok(results) => results,
            Err(e) => return format!("retrieval failed: {e}\n"),
        };

        if results.is_empty() {
            return "no chunks retrieved (index is empty)\n".to_string();
        }

        let mut out = String::new();
        for (rank, result) in results.iter().enumerate() {
            let preview: String = result.chunk.text.chars().take(100).collect();
            let ellipsis = if result.chunk.text.chars().count() > 100 { "…" } else { "" };
            out.push_str(&format!(
                "{}. {} (score {:.4}, document {})\n   {preview}{ellipsis}\n",
                rank + 1,
                result.chunk.id,
                result.score,
                result.chunk.document_id,
            ));
        }
        out
    }
}
