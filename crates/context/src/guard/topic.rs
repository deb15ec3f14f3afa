//! Topic guard
//!
//! Classifies a raw query against an ordered table of disallowed topic
//! categories before any retrieval happens. The first category with a
//! matching pattern wins and that pattern is reported back.

use docguard_common::errors::{AppError, Result};
use regex_lite::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Category that caused a query to be blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    None,
    Politics,
    Religion,
    PersonalAdvice,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::None => "none",
            BlockReason::Politics => "politics",
            BlockReason::Religion => "religion",
            BlockReason::PersonalAdvice => "personal_advice",
        }
    }
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub allowed: bool,
    pub reason: BlockReason,
    /// Pattern that matched, `"empty_text"` for blank queries, else empty
    pub matched_pattern: String,
}

impl RuleVerdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: BlockReason::None,
            matched_pattern: String::new(),
        }
    }

    fn block(reason: BlockReason, matched_pattern: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason,
            matched_pattern: matched_pattern.into(),
        }
    }
}

/// Marker reported for blank queries
pub const EMPTY_TEXT: &str = "empty_text";

/// Ordered policy table: category, then its patterns
const TOPIC_RULES: &[(BlockReason, &[&str])] = &[
    (
        BlockReason::Politics,
        &[r"\b(prime? minister|president|election|party|politic(al|s)|parliament|loksabha|rajyasabha|mp|mla)\b"],
    ),
    (
        BlockReason::Religion,
        &[r"\b(hindu(ism)?|muslim|christian(ity)?|sikh(ism)?|buddh(ism)?|jain(ism)?|religion|god|allah|bhagwan|jesus)\b"],
    ),
    (
        BlockReason::PersonalAdvice,
        &[r"\b(relationship advice|dating|breakup|therapy on my life|should i marry|love advice)\b"],
    ),
];

struct CompiledRule {
    reason: BlockReason,
    patterns: Vec<(&'static str, Regex)>,
}

/// Pre-retrieval policy filter
pub struct TopicGuard {
    rules: Vec<CompiledRule>,
}

impl TopicGuard {
    /// Compile the built-in policy table
    pub fn new() -> Result<Self> {
        let rules = TOPIC_RULES
            .iter()
            .map(|(reason, patterns)| {
                let patterns = patterns
                    .iter()
                    .map(|pattern| {
                        RegexBuilder::new(pattern)
                            .case_insensitive(true)
                            .build()
                            .map(|regex| (*pattern, regex))
                            .map_err(|e| AppError::Configuration {
                                message: format!("Invalid topic pattern {}: {}", pattern, e),
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledRule {
                    reason: *reason,
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Classify a query. Never fails; blank input is blocked.
    pub fn evaluate(&self, query: &str) -> RuleVerdict {
        let text = query.trim();
        if text.is_empty() {
            return RuleVerdict::block(BlockReason::PersonalAdvice, EMPTY_TEXT);
        }

        for rule in &self.rules {
            if let Some((pattern, _)) = rule.patterns.iter().find(|(_, re)| re.is_match(text)) {
                return RuleVerdict::block(rule.reason, *pattern);
            }
        }

        RuleVerdict::allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> TopicGuard {
        TopicGuard::new().unwrap()
    }

    #[test]
    fn test_politics_blocked() {
        let verdict = guard().evaluate("Who should be the next prime minister?");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, BlockReason::Politics);
        assert_eq!(verdict.matched_pattern, TOPIC_RULES[0].1[0]);
    }

    #[test]
    fn test_case_insensitive() {
        let verdict = guard().evaluate("Tell me about the PRESIDENT");
        assert_eq!(verdict.reason, BlockReason::Politics);

        let verdict = guard().evaluate("prim minister duties");
        assert_eq!(verdict.reason, BlockReason::Politics);
    }

    #[test]
    fn test_religion_blocked() {
        let verdict = guard().evaluate("Is there a God?");
        assert!(!verdict.allowed);
        assert_eq!(verdict.reason, BlockReason::Religion);
    }

    #[test]
    fn test_personal_advice_blocked() {
        let verdict = guard().evaluate("Should I marry my partner?");
        assert_eq!(verdict.reason, BlockReason::PersonalAdvice);
        assert!(!verdict.allowed);
    }

    #[test]
    fn test_category_order() {
        // Matches politics and religion; politics is checked first
        let verdict = guard().evaluate("Which party does the muslim league support?");
        assert_eq!(verdict.reason, BlockReason::Politics);
    }

    #[test]
    fn test_word_boundaries() {
        // "goddess" and "partying" do not contain whole-word matches
        assert!(guard().evaluate("goddess statues storage guidelines").allowed);
        assert!(guard().evaluate("partying rules in the dorm").allowed);
        assert!(guard().evaluate("the mpeg format").allowed);
    }

    #[test]
    fn test_blank_query_blocked() {
        for query in ["", "   ", "\n\t"] {
            let verdict = guard().evaluate(query);
            assert!(!verdict.allowed);
            assert_eq!(verdict.reason, BlockReason::PersonalAdvice);
            assert_eq!(verdict.matched_pattern, EMPTY_TEXT);
        }
    }

    #[test]
    fn test_allowed_query() {
        let verdict = guard().evaluate("What is vaccine storage temperature?");
        assert!(verdict.allowed);
        assert_eq!(verdict.reason, BlockReason::None);
        assert_eq!(verdict.matched_pattern, "");
    }
}
