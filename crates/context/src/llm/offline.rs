//! Offline extractive model
//!
//! Answers by quoting the most relevant passage with its citation tag.
//! Makes no network calls, so the full pipeline runs without credentials.

use super::{LanguageModel, Prompt};
use crate::grounding::REFUSAL_EMPTY;
use async_trait::async_trait;
use docguard_common::errors::Result;

pub const OFFLINE_MODEL_NAME: &str = "offline-extractive";

/// Longest quote taken from a passage, in characters
const MAX_QUOTE_CHARS: usize = 600;

#[derive(Debug, Default, Clone)]
pub struct OfflineModel;

impl OfflineModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LanguageModel for OfflineModel {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let Some(top) = prompt.passages.first() else {
            return Ok(REFUSAL_EMPTY.to_string());
        };

        let text = top.text.trim();
        let quote: String = text.chars().take(MAX_QUOTE_CHARS).collect();
        let ellipsis = if text.chars().count() > MAX_QUOTE_CHARS { "..." } else { "" };

        Ok(format!("{}{} {}", quote, ellipsis, top.citation_tag()))
    }

    fn model_name(&self) -> &str {
        OFFLINE_MODEL_NAME
    }
}
