//! Index building: load the corpus, chunk it, embed the chunks, and produce
//! a [`VectorIndex`].

use std::sync::Arc;

use crate::chunker::chunk_document;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::models::Chunk;

/// Build an in-memory index from the configured corpus.
///
/// Documents load in sorted path order and chunks keep document order, so
/// the index layout is deterministic for a given corpus and provider.
pub async fn build_index(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<VectorIndex> {
    let documents = crate::loader::load_corpus(&config.corpus)?;

    let mut chunks: Vec<Chunk> = Vec::new();
    for document in &documents {
        chunks.extend(chunk_document(
            document,
            config.chunking.chunk_size,
            config.chunking.overlap,
        ));
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embedding.batch_size.max(1)) {
        vectors.extend(provider.embed_batch(batch).await?);
    }

    VectorIndex::build(chunks, vectors, provider.model_name())
}

/// Build an index and persist it to the configured index directory.
pub async fn build_and_persist(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<VectorIndex> {
    let index = build_index(config, provider).await?;
    index.persist(&config.index.dir).await?;
    Ok(index)
}

/// Load the persisted index if one exists, otherwise build and persist one.
pub async fn open_or_build(
    config: &Config,
    provider: Arc<dyn EmbeddingProvider>,
) -> Result<VectorIndex> {
    if VectorIndex::store_exists(&config.index.dir) {
        VectorIndex::load(&config.index.dir, provider.model_name()).await
    } else {
        build_and_persist(config, provider).await
    }
}
