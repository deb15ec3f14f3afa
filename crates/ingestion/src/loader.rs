//! Document loading
//!
//! Turns files on disk into chunks ready for embedding. PDFs are read page
//! by page and each chunk keeps its 0-indexed page; text and markdown files
//! are read whole and carry no page.
//!
//! A loader built from configuration only reads files inside its upload
//! root; paths that escape it, directly or through symlinks, are rejected.

use crate::chunker::{chunk_text, ChunkingConfig};
use crate::errors::IngestionError;
use crate::pdf;
use docguard_common::config::IngestionConfig;
use docguard_common::DocumentChunk;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument};

/// Formats the loader knows how to read
const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

/// Loads supported documents and splits them into chunks
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    chunking: ChunkingConfig,
    allowed_extensions: Vec<String>,
    upload_root: Option<PathBuf>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new(
            ChunkingConfig::default(),
            SUPPORTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        )
    }
}

impl DocumentLoader {
    pub fn new(chunking: ChunkingConfig, allowed_extensions: Vec<String>) -> Self {
        Self {
            chunking,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            upload_root: None,
        }
    }

    /// Confine file loading to `root`; relative paths are resolved against it
    pub fn with_upload_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.upload_root = Some(root.into());
        self
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(
            ChunkingConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
            config.allowed_extensions.clone(),
        )
        .with_upload_root(&config.upload_dir)
    }

    pub fn chunking(&self) -> &ChunkingConfig {
        &self.chunking
    }

    /// Load one file and split it into chunks whose source is the path
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load_and_split(&self, path: &Path) -> Result<Vec<DocumentChunk>, IngestionError> {
        let source = path.display().to_string();
        let file = self.resolve_path(path)?;

        if !file.is_file() {
            return Err(IngestionError::FileNotFound(source));
        }

        let extension = self.check_extension(&file)?;

        let chunks = if extension == "pdf" {
            let mut chunks = Vec::new();
            for page in pdf::extract_pages(&file)? {
                chunks.extend(self.split_text(&page.text, &source, Some(page.number))?);
            }
            chunks
        } else {
            let bytes = std::fs::read(&file)?;
            let text = String::from_utf8(bytes)
                .map_err(|_| IngestionError::InvalidEncoding(source.clone()))?;
            self.split_text(&text, &source, None)?
        };

        info!(chunks = chunks.len(), "Document loaded");
        Ok(chunks)
    }

    /// Split already-extracted text into chunks attributed to `source`
    pub fn split_text(
        &self,
        text: &str,
        source: &str,
        page: Option<u32>,
    ) -> Result<Vec<DocumentChunk>, IngestionError> {
        let pieces = chunk_text(text, &self.chunking)?;
        debug!(source, ?page, pieces = pieces.len(), "Split text");

        Ok(pieces
            .into_iter()
            .map(|piece| DocumentChunk {
                text: piece.content,
                source: source.to_string(),
                page,
                start_index: piece.start_pos,
            })
            .collect())
    }

    /// Map a requested path to the file to read, enforcing the upload root
    fn resolve_path(&self, path: &Path) -> Result<PathBuf, IngestionError> {
        let Some(root) = &self.upload_root else {
            return Ok(path.to_path_buf());
        };

        let root = root
            .canonicalize()
            .map_err(|_| IngestionError::FileNotFound(root.display().to_string()))?;
        let outside = || IngestionError::OutsideUploadRoot(path.display().to_string());

        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(outside());
        }

        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };

        let resolved = match candidate.canonicalize() {
            Ok(resolved) => resolved,
            Err(_) if candidate.starts_with(&root) => {
                return Err(IngestionError::FileNotFound(path.display().to_string()))
            }
            Err(_) => return Err(outside()),
        };

        if !resolved.starts_with(&root) {
            return Err(outside());
        }
        Ok(resolved)
    }

    /// Lowercased extension, if it is one we accept
    fn check_extension(&self, path: &Path) -> Result<String, IngestionError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if SUPPORTED_EXTENSIONS.contains(&extension.as_str())
            && self.allowed_extensions.contains(&extension)
        {
            return Ok(extension);
        }

        Err(IngestionError::UnsupportedFile(path.display().to_string()))
    }
}
