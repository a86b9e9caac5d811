//! Answer synthesis from retrieved context.
//!
//! Packs retrieved chunks into the LLM's context budget in rank order. If
//! everything fits, one completion call produces the answer. If not, the
//! answer is refined iteratively: an initial answer from the best chunks,
//! then one extra call per remaining batch that folds new context into the
//! running answer.
//!
//! Token counts are approximated as `chars / 4`; a rough but serviceable
//! estimate for English prose that avoids shipping a tokenizer.

use std::sync::Arc;

use crate::error::Result;
use crate::llm::LlmClient;
use crate::models::ScoredChunk;

/// Approximate characters per token used for all budget arithmetic.
pub const CHARS_PER_TOKEN: usize = 4;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using only the \
provided context. If the context does not contain the answer, say so and suggest rephrasing the \
question or adding relevant documents. Be concise and professional.";

const EMPTY_CONTEXT: &str = "(no relevant context was retrieved)";

/// Synthesizes answers by prompting an LLM with retrieved context.
pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    context_char_budget: usize,
}

impl Synthesizer {
    /// `context_token_budget` bounds the retrieved-context block per call.
    pub fn new(llm: Arc<dyn LlmClient>, context_token_budget: usize) -> Self {
        Self { llm, context_char_budget: context_token_budget * CHARS_PER_TOKEN }
    }

    /// Answer `query` from `chunks`, given formatted conversation `history`.
    ///
    /// Chunks must already be ranked best-first; the best context always
    /// lands in the first (and possibly only) LLM call.
    pub async fn synthesize(
        &self,
        query: &str,
        history: &str,
        chunks: &[ScoredChunk],
    ) -> Result<String> {
        let batches = self.pack(chunks);

        let first_context = match batches.first() {
            Some(batch) => batch.clone(),
            None => EMPTY_CONTEXT.to_string(),
        };

        let prompt = format!(
            "Conversation so far:\n{history}\n\nContext:\n{first_context}\n\nQuestion: {query}\n\nAnswer:"
        );
        let mut answer = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;

        for batch in batches.iter().skip(1) {
            let refine_prompt = format!(
                "Question: {query}\n\nExisting answer:\n{answer}\n\nAdditional context:\n{batch}\n\n\
                 Refine the existing answer using the additional context. If the additional \
                 context adds nothing, repeat the existing answer unchanged."
            );
            answer = self.llm.complete(SYSTEM_PROMPT, &refine_prompt).await?;
        }

        Ok(answer)
    }

    /// Group chunk texts into batches that each fit the context budget.
    ///
    /// Greedy in rank order. A single chunk larger than the whole budget is
    /// truncated at a `char` boundary rather than dropped.
    fn pack(&self, chunks: &[ScoredChunk]) -> Vec<String> {
        let mut batches = Vec::new();
        let mut current = String::new();

        for scored in chunks {
            let mut text = scored.chunk.text.as_str().to_string();
            if text.len() > self.context_char_budget {
                let mut cut = self.context_char_budget;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }

            // +2 for the separating blank line
            if !current.is_empty() && current.len() + text.len() + 2 > self.context_char_budget {
                batches.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&text);
        }

        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt and replies with a canned answer per call.
    struct RecordingLlm {
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingLlm {
        fn new() -> Arc<Self> {
            Arc::new(Self { prompts: Mutex::new(Vec::new()) })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        fn model_name(&self) -> &str {
            "recording-test"
        }

        async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push(prompt.to_string());
            Ok(format!("answer {}", prompts.len()))
        }
    }

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: crate::models::Chunk {
                id: "d#0".to_string(),
                document_id: "d".to_string(),
                index: 0,
                text: text.to_string(),
                start_offset: 0,
                end_offset: text.len(),
            },
            score: 1.0,
        }
    }

    #[tokio::test]
    async fn single_call_when_context_fits() {
        let llm = RecordingLlm::new();
        // 100-token budget = 400 chars; two small chunks fit together.
        let synth = Synthesizer::new(llm.clone(), 100);
        let chunks = vec![scored("The sky is blue."), scored("Grass is green.")];

        let answer = synth.synthesize("what color is the sky?", "(empty)", &chunks).await.unwrap();

        assert_eq!(answer, "answer 1");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The sky is blue."));
        assert!(prompts[0].contains("Grass is green."));
        assert!(prompts[0].contains("what color is the sky?"));
        assert!(prompts[0].contains("(empty)"));
    }

    #[tokio::test]
    async fn refines_when_context_exceeds_budget() {
        let llm = RecordingLlm::new();
        // 10-token budget = 40 chars; each 30-char chunk needs its own batch.
        let synth = Synthesizer::new(llm.clone(), 10);
        let chunks = vec![scored(&"a".repeat(30)), scored(&"b".repeat(30))];

        let answer = synth.synthesize("q", "", &chunks).await.unwrap();

        assert_eq!(answer, "answer 2");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Existing answer:\nanswer 1"));
        assert!(prompts[1].contains(&"b".repeat(30)));
    }

    #[tokio::test]
    async fn empty_context_uses_marker() {
        let llm = RecordingLlm::new();
        let synth = Synthesizer::new(llm.clone(), 100);

        let answer = synth.synthesize("q", "", &[]).await.unwrap();

        assert_eq!(answer, "answer 1");
        assert!(llm.prompts()[0].contains("(no relevant context was retrieved)"));
    }

    #[tokio::test]
    async fn oversized_chunk_is_truncated_not_dropped() {
        let llm = RecordingLlm::new();
        // 1-token budget = 4 chars
        let synth = Synthesizer::new(llm.clone(), 1);
        let chunks = vec![scored("éééééé")];

        synth.synthesize("q", "", &chunks).await.unwrap();

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("éé"));
        assert!(!prompt.contains("ééé"));
    }
}
