//! Shared domain models
//!
//! Types that cross crate boundaries: indexed chunks, retrieved passages,
//! display citations and conversation turns.

mod conversation;
mod passage;

pub use conversation::{ConversationTurn, Role};
pub use passage::{source_basename, Citation, DocumentChunk, RetrievedPassage};
