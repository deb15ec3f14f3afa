//! Text chunking module
//!
//! Splits text into chunks of at most `chunk_size` characters along the
//! coarsest semantic boundary that fits (paragraphs and lines before
//! sentences, words and characters). Consecutive chunks share up to
//! `chunk_overlap` characters.

use crate::errors::IngestionError;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// Configuration for text chunking
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
        }
    }
}

/// A text chunk with position metadata
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// The chunk content
    pub content: String,
    /// Index of this chunk in the document
    pub index: usize,
    /// Start character position in original text
    pub start_pos: usize,
}

/// Split text into chunks for embedding
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>, IngestionError> {
    if config.chunk_size == 0 {
        return Err(IngestionError::ChunkingError(
            "chunk size must be positive".to_string(),
        ));
    }
    if config.chunk_overlap >= config.chunk_size {
        return Err(IngestionError::ChunkingError(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            config.chunk_overlap, config.chunk_size
        )));
    }

    let chunk_config = ChunkConfig::new(config.chunk_size)
        .with_overlap(config.chunk_overlap)
        .map_err(|e| IngestionError::ChunkingError(e.to_string()))?;
    let splitter = TextSplitter::new(chunk_config);

    // Byte offsets arrive in order, so char positions are counted incrementally
    let mut result = Vec::new();
    let mut byte_pos = 0;
    let mut char_pos = 0;

    for (index, (offset, content)) in splitter.chunk_indices(text).enumerate() {
        char_pos += text[byte_pos..offset].chars().count();
        byte_pos = offset;

        result.push(TextChunk {
            content: content.to_string(),
            index,
            start_pos: char_pos,
        });
    }

    debug!(
        input_len = text.len(),
        chunk_count = result.len(),
        chunk_size = config.chunk_size,
        "Text chunked"
    );

    Ok(result)
}
