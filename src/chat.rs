//! Chat session: ties retrieval, synthesis, and memory into a per-turn loop.

use crate::error::Result;
use crate::memory::ChatMemory;
use crate::models::{ChatTurn, ScoredChunk};
use crate::retriever::Retriever;
use crate::synthesizer::Synthesizer;

/// A stateful question-answering session over an indexed corpus.
///
/// Each turn retrieves context for the question, synthesizes an answer with
/// the conversation history included in the prompt, and records both sides
/// in memory. A failed turn leaves the history untouched.
pub struct ChatSession {
    retriever: Retriever,
    synthesizer: Synthesizer,
    memory: ChatMemory,
}

impl ChatSession {
    pub fn new(retriever: Retriever, synthesizer: Synthesizer, memory: ChatMemory) -> Self {
        Self { retriever, synthesizer, memory }
    }

    /// Answer `question` and record the exchange.
    pub async fn chat(&mut self, question: &str) -> Result<String> {
        let history = self.memory.format_history();
        let chunks = self.retriever.retrieve(question).await?;
        let answer = self.synthesizer.synthesize(question, &history, &chunks).await?;

        self.memory.push(ChatTurn::user(question));
        self.memory.push(ChatTurn::assistant(&answer));
        Ok(answer)
    }

    /// Retrieval results for `question` without generating an answer or
    /// touching the history.
    pub async fn inspect(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        self.retriever.retrieve(question).await
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        self.memory.turns().cloned().collect()
    }

    pub fn clear_history(&mut self) {
        self.memory.clear();
    }
}
