//! Peer-review results from the second stage.

use serde::{Deserialize, Serialize};

/// One entry of a reviewer's ranking.
///
/// Within a single [`ReviewResult`], model ids are unique and ranks form
/// a contiguous `1..=k` permutation (the parser renumbers them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    /// The ranked model (never the reviewer itself).
    pub model_id: String,
    /// 1-based rank; 1 is best.
    pub rank: u32,
    /// The reviewer's reasoning for this placement.
    pub reasoning: String,
}

/// A reviewer's complete ranking of the anonymized opinions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    /// The model that performed the review.
    pub reviewer_model_id: String,
    /// Parsed rankings, best first. Empty when parsing failed.
    pub rankings: Vec<Ranking>,
    /// The raw reply text, kept for auditing even when unparseable.
    pub raw_text: String,
    /// Whether the reply could be interpreted. Reviews with
    /// `parse_ok = false` are emitted but excluded from aggregation.
    pub parse_ok: bool,
}

impl ReviewResult {
    /// A review that produced no usable rankings.
    pub fn failed(reviewer_model_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            reviewer_model_id: reviewer_model_id.into(),
            rankings: Vec::new(),
            raw_text: raw_text.into(),
            parse_ok: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_review_has_no_rankings() {
        let r = ReviewResult::failed("m2", "I don't know.");
        assert!(!r.parse_ok);
        assert!(r.rankings.is_empty());
        assert_eq!(r.raw_text, "I don't know.");
    }
}
