//! Groundedness verification
//!
//! A purely textual, post-hoc check on a synthesized answer. It does not
//! judge whether the answer is correct, only whether it is non-trivial,
//! backed by retrieved passages, and carries an inline citation marker.

use docguard_common::RetrievedPassage;

/// Returned for blocked, out-of-scope and ungrounded queries
pub const REFUSAL_OOS: &str = "This question is outside the scope of my knowledge base.";

/// Exact string the model must return when the context lacks the answer
pub const REFUSAL_EMPTY: &str = "I\u{2019}m sorry, I don\u{2019}t have that information in my knowledge base.";

/// Returned when the session has no knowledge base
pub const REFUSAL_NO_KB: &str = "Please upload and ingest documents first.";

/// Literal marker an answer must carry to count as cited
pub const CITATION_MARKER: &str = "(source:";

/// Minimum trimmed answer length, in characters
pub const MIN_ANSWER_CHARS: usize = 5;

/// Nothing relevant was retrieved
pub fn is_outside_scope(passages: &[RetrievedPassage]) -> bool {
    passages.is_empty()
}

/// Answer is long enough, backed by passages and cites a source
pub fn is_grounded_enough(answer: &str, passages: &[RetrievedPassage]) -> bool {
    if answer.trim().chars().count() < MIN_ANSWER_CHARS {
        return false;
    }
    if passages.is_empty() {
        return false;
    }
    answer.contains(CITATION_MARKER)
}
