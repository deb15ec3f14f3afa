//! DocGuard Context Library
//!
//! The guardrail decision core and the session surface around it:
//! - Topic guard (pre-retrieval policy filter)
//! - Answer synthesis over retrieved passages
//! - Groundedness verification and refusal constants
//! - Query pipeline with audit logging
//! - Sessions, ingestion and knowledge base lifecycle

pub mod assistant;
pub mod grounding;
pub mod guard;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod synthesizer;

pub use assistant::{Assistant, InlineDocument};
pub use grounding::{REFUSAL_EMPTY, REFUSAL_NO_KB, REFUSAL_OOS};
pub use guard::{BlockReason, RuleVerdict, TopicGuard};
pub use llm::{LanguageModel, Prompt};
pub use pipeline::{QueryOutcome, QueryPipeline};
pub use session::Session;
pub use synthesizer::Synthesizer;
