//! Document chunks, retrieved passages and display citations

use serde::{Deserialize, Serialize};
use std::path::Path;

/// A chunk of an ingested document, ready to be embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Chunk text
    pub text: String,

    /// Path of the file the chunk was read from
    pub source: String,

    /// 0-indexed page number (PDF sources only)
    pub page: Option<u32>,

    /// Character offset of the chunk within its page or file
    pub start_index: usize,
}

/// A passage returned by retrieval for a single query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    pub text: String,

    /// Source identifier (file path of the ingested document)
    pub source_id: String,

    /// 0-indexed page number, when the source has pages
    pub page_number: Option<u32>,

    /// Similarity score against the query
    pub relevance_score: f32,
}

impl RetrievedPassage {
    /// Build a passage from an indexed chunk and its score
    pub fn from_chunk(chunk: &DocumentChunk, relevance_score: f32) -> Self {
        Self {
            text: chunk.text.clone(),
            source_id: chunk.source.clone(),
            page_number: chunk.page,
            relevance_score,
        }
    }

    /// File name of the source, without directories
    pub fn source_name(&self) -> &str {
        source_basename(&self.source_id)
    }

    /// Page number as shown to readers (1-indexed)
    pub fn display_page(&self) -> Option<u32> {
        self.page_number.map(|p| p + 1)
    }

    /// Inline citation tag, e.g. `(source: doc.pdf p.2)`
    pub fn citation_tag(&self) -> String {
        match self.display_page() {
            Some(page) => format!("(source: {} p.{})", self.source_name(), page),
            None => format!("(source: {})", self.source_name()),
        }
    }

    /// Display citation for this passage
    pub fn citation(&self) -> Citation {
        Citation {
            source: self.source_name().to_string(),
            page: self.display_page(),
        }
    }
}

/// Source reference shown next to an answer and written to the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// File basename
    pub source: String,

    /// 1-indexed page, when available
    pub page: Option<u32>,
}

/// Strip directories from a source path
pub fn source_basename(source: &str) -> &str {
    Path::new(source)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(source: &str, page: Option<u32>) -> RetrievedPassage {
        RetrievedPassage {
            text: "Vaccines are stored between 2 and 8 degrees.".to_string(),
            source_id: source.to_string(),
            page_number: page,
            relevance_score: 0.8,
        }
    }

    #[test]
    fn test_citation_tag_with_page() {
        let p = passage("/tmp/uploads/doc.pdf", Some(1));
        assert_eq!(p.citation_tag(), "(source: doc.pdf p.2)");
        assert_eq!(
            p.citation(),
            Citation {
                source: "doc.pdf".into(),
                page: Some(2)
            }
        );
    }

    #[test]
    fn test_citation_tag_without_page() {
        let p = passage("notes/handbook.md", None);
        assert_eq!(p.citation_tag(), "(source: handbook.md)");
        assert_eq!(p.citation().page, None);
    }

    #[test]
    fn test_basename_of_bare_name() {
        assert_eq!(source_basename("doc.pdf"), "doc.pdf");
    }
}
