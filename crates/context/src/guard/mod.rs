//! Query guardrails applied before retrieval

pub mod topic;

pub use topic::{BlockReason, RuleVerdict, TopicGuard, EMPTY_TEXT};
