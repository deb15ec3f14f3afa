//! Guardrail decision pipeline
//!
//! query -> topic guard -> retrieval -> synthesis -> groundedness gate.
//! Each stage can short-circuit into a refusal. Every call writes exactly
//! one `query` audit event followed by exactly one `response` event, on
//! refusal and failure paths alike. A call that is dropped mid-flight (for
//! example by a request timeout) writes its response event on drop.

use crate::grounding::{is_grounded_enough, is_outside_scope, REFUSAL_NO_KB, REFUSAL_OOS};
use crate::guard::{RuleVerdict, TopicGuard};
use crate::synthesizer::Synthesizer;
use docguard_common::audit::{
    AuditLogger, FailureRecord, FailureStage, QueryRecord, RefusalType, ResponseRecord,
};
use docguard_common::errors::{AppError, Result};
use docguard_common::{metrics, Citation, ConversationTurn, RetrievedPassage, MAX_PASSAGES};
use docguard_search::Retriever;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Failure message recorded when a query is dropped before it completes
pub const CANCELLED_MESSAGE: &str = "query cancelled before completion";

/// Final decision for one query
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    /// Text shown to the user: the answer verbatim or a refusal constant
    pub answer: String,
    /// Sources backing a grounded answer (empty on refusal)
    pub citations: Vec<Citation>,
    pub grounded: bool,
    pub refusal_type: RefusalType,
    /// Topic guard verdict for the query
    pub verdict: RuleVerdict,
}

impl QueryOutcome {
    fn refusal(answer: &str, refusal_type: RefusalType, verdict: RuleVerdict) -> Self {
        Self {
            answer: answer.to_string(),
            citations: Vec::new(),
            grounded: false,
            refusal_type,
            verdict,
        }
    }
}

/// Stateless decision core; session state is passed in per call
pub struct QueryPipeline {
    guard: TopicGuard,
    synthesizer: Synthesizer,
    audit: AuditLogger,
    score_threshold: f32,
}

impl QueryPipeline {
    pub fn new(
        guard: TopicGuard,
        synthesizer: Synthesizer,
        audit: AuditLogger,
        score_threshold: f32,
    ) -> Self {
        Self {
            guard,
            synthesizer,
            audit,
            score_threshold,
        }
    }

    pub fn score_threshold(&self) -> f32 {
        self.score_threshold
    }

    pub fn model_name(&self) -> &str {
        self.synthesizer.model_name()
    }

    /// Decide the answer for `query`.
    ///
    /// `knowledge_base` is `None` when nothing has been ingested. `history`
    /// holds the turns before this query. Retrieval and synthesis failures
    /// are returned as errors after the response event has been written.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn run(
        &self,
        query: &str,
        knowledge_base: Option<&dyn Retriever>,
        history: &[ConversationTurn],
    ) -> Result<QueryOutcome> {
        let verdict = self.guard.evaluate(query);

        if !verdict.allowed {
            metrics::record_topic_block(verdict.reason.as_str());
            self.audit.log_query(QueryRecord {
                query: query.to_string(),
                blocked: true,
                reason: verdict.reason.as_str().to_string(),
                details: verdict.matched_pattern.clone(),
            });
            let mut pending = PendingResponse::new(&self.audit);
            info!(blocked = true, reason = %verdict.reason, "Query blocked by topic guard");

            let outcome = QueryOutcome::refusal(REFUSAL_OOS, RefusalType::CategoryBlock, verdict);
            return Ok(self.finish(&mut pending, outcome, Vec::new()));
        }

        self.audit.log_query(QueryRecord {
            query: query.to_string(),
            blocked: false,
            reason: verdict.reason.as_str().to_string(),
            details: String::new(),
        });
        let mut pending = PendingResponse::new(&self.audit);

        let Some(knowledge_base) = knowledge_base else {
            let outcome = QueryOutcome::refusal(REFUSAL_NO_KB, RefusalType::NoKb, verdict);
            return Ok(self.finish(&mut pending, outcome, Vec::new()));
        };

        let passages = self.retrieve(&mut pending, query, knowledge_base).await?;
        let docs: Vec<Citation> = passages.iter().map(RetrievedPassage::citation).collect();
        pending.stage = FailureStage::Synthesis;
        pending.docs = docs.clone();

        let answer = match self.synthesizer.synthesize(query, &passages, history).await {
            Ok(answer) => answer,
            Err(e) => {
                self.log_failure(&mut pending, FailureStage::Synthesis, &e, docs);
                return Err(e);
            }
        };

        if is_outside_scope(&passages) || !is_grounded_enough(&answer, &passages) {
            let outcome =
                QueryOutcome::refusal(REFUSAL_OOS, RefusalType::OosOrNotGrounded, verdict);
            return Ok(self.finish(&mut pending, outcome, docs));
        }

        let outcome = QueryOutcome {
            answer,
            citations: docs.clone(),
            grounded: true,
            refusal_type: RefusalType::None,
            verdict,
        };
        Ok(self.finish(&mut pending, outcome, docs))
    }

    async fn retrieve(
        &self,
        pending: &mut PendingResponse<'_>,
        query: &str,
        knowledge_base: &dyn Retriever,
    ) -> Result<Vec<RetrievedPassage>> {
        let start = Instant::now();
        match knowledge_base.retrieve(query, self.score_threshold).await {
            Ok(mut passages) => {
                passages.truncate(MAX_PASSAGES);
                metrics::record_retrieval(start.elapsed().as_secs_f64(), passages.len(), true);
                info!(
                    passages = passages.len(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Retrieval complete"
                );
                Ok(passages)
            }
            Err(e) => {
                metrics::record_retrieval(start.elapsed().as_secs_f64(), 0, false);
                let e = match e {
                    AppError::RetrievalFailed { .. } => e,
                    other => AppError::RetrievalFailed {
                        message: other.to_string(),
                    },
                };
                self.log_failure(pending, FailureStage::Retrieval, &e, Vec::new());
                Err(e)
            }
        }
    }

    /// Write the response event for a decided outcome
    fn finish(
        &self,
        pending: &mut PendingResponse<'_>,
        outcome: QueryOutcome,
        docs: Vec<Citation>,
    ) -> QueryOutcome {
        pending.write(ResponseRecord {
            answer: outcome.answer.clone(),
            grounded: outcome.grounded,
            docs,
            refusal_type: outcome.refusal_type,
            failure: None,
        });
        metrics::record_query_decision(outcome.refusal_type.as_str());
        info!(
            refusal_type = outcome.refusal_type.as_str(),
            grounded = outcome.grounded,
            citations = outcome.citations.len(),
            "Query answered"
        );
        outcome
    }

    /// Write the response event for an infrastructure failure
    fn log_failure(
        &self,
        pending: &mut PendingResponse<'_>,
        stage: FailureStage,
        error: &AppError,
        docs: Vec<Citation>,
    ) {
        warn!(stage = ?stage, error = %error, "Query failed");
        pending.write(ResponseRecord {
            answer: String::new(),
            grounded: false,
            docs,
            refusal_type: RefusalType::OosOrNotGrounded,
            failure: Some(FailureRecord {
                stage,
                message: error.to_string(),
            }),
        });
        metrics::record_query_decision("failed");
    }
}

/// Owes the `response` event for a logged query.
///
/// Dropping it unwritten records a cancellation failure at the stage the
/// query had reached.
struct PendingResponse<'a> {
    audit: &'a AuditLogger,
    stage: FailureStage,
    docs: Vec<Citation>,
    written: bool,
}

impl<'a> PendingResponse<'a> {
    fn new(audit: &'a AuditLogger) -> Self {
        Self {
            audit,
            stage: FailureStage::Retrieval,
            docs: Vec::new(),
            written: false,
        }
    }

    fn write(&mut self, record: ResponseRecord) {
        self.audit.log_response(record);
        self.written = true;
    }
}

impl Drop for PendingResponse<'_> {
    fn drop(&mut self) {
        if self.written {
            return;
        }

        warn!(stage = ?self.stage, "Query cancelled before a response was produced");
        self.audit.log_response(ResponseRecord {
            answer: String::new(),
            grounded: false,
            docs: std::mem::take(&mut self.docs),
            refusal_type: RefusalType::OosOrNotGrounded,
            failure: Some(FailureRecord {
                stage: self.stage,
                message: CANCELLED_MESSAGE.to_string(),
            }),
        });
        metrics::record_query_decision("cancelled");
    }
}
