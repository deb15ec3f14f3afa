//! Answer synthesis
//!
//! Formats retrieved passages into a context block, wraps it in the fixed
//! instruction and conversation history, and asks the language model for
//! an answer within a deadline. There are no retries.

use crate::grounding::REFUSAL_EMPTY;
use crate::llm::{LanguageModel, Prompt};
use docguard_common::errors::{AppError, Result};
use docguard_common::{metrics, ConversationTurn, RetrievedPassage, MAX_PASSAGES};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// System instruction sent with every synthesis request
pub const SYSTEM_INSTRUCTION: &str = "You are a careful assistant for Q&A using ONLY the provided context.\n\
- If the context does not contain the answer, respond exactly:\n\
\"I\u{2019}m sorry, I don\u{2019}t have that information in my knowledge base.\"\n\
- Do not use outside knowledge.\n\
- Be concise. Include inline (source: <file> p.<page>) when possible.";

/// Separator between passages in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Citation tag line followed by the passage text
pub fn format_passage(passage: &RetrievedPassage) -> String {
    format!("{}\n{}", passage.citation_tag(), passage.text)
}

/// Join passages into the context block
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(format_passage)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Final human message carrying the question and its context
pub fn build_message(question: &str, context: &str) -> String {
    format!("Question: {}\n\nContext:\n{}\n\nAnswer:", question, context)
}

/// Produces answers constrained to retrieved context
pub struct Synthesizer {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer `question` from `passages`, given earlier turns.
    ///
    /// Returns `REFUSAL_EMPTY` without calling the model when there are no
    /// passages. A model error becomes `SynthesisFailed`; exceeding the
    /// deadline becomes `SynthesisTimeout`.
    pub async fn synthesize(
        &self,
        question: &str,
        passages: &[RetrievedPassage],
        history: &[ConversationTurn],
    ) -> Result<String> {
        if passages.is_empty() {
            return Ok(REFUSAL_EMPTY.to_string());
        }

        let passages = &passages[..passages.len().min(MAX_PASSAGES)];
        let prompt = Prompt {
            system: SYSTEM_INSTRUCTION.to_string(),
            history: history.to_vec(),
            message: build_message(question, &build_context(passages)),
            passages: passages.to_vec(),
        };

        let model = self.model.model_name().to_string();
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.model.complete(&prompt)).await;
        let elapsed = start.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok(answer)) => {
                metrics::record_synthesis(elapsed, &model, true);
                debug!(model = %model, latency_ms = (elapsed * 1000.0) as u64, "Answer synthesized");
                Ok(answer)
            }
            Ok(Err(e)) => {
                metrics::record_synthesis(elapsed, &model, false);
                warn!(model = %model, error = %e, "Synthesis failed");
                Err(match e {
                    AppError::SynthesisFailed { .. } | AppError::SynthesisTimeout { .. } => e,
                    other => AppError::SynthesisFailed {
                        message: other.to_string(),
                    },
                })
            }
            Err(_) => {
                metrics::record_synthesis(elapsed, &model, false);
                warn!(model = %model, timeout_secs = self.timeout.as_secs(), "Synthesis timed out");
                Err(AppError::SynthesisTimeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
