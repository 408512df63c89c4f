//! Rank aggregation across reviewers.
//!
//! Turns the set of valid [`ReviewResult`]s into the per-model mean-rank
//! summary handed to the chairman before synthesis.

use crate::council::review::ReviewResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A model's aggregated standing across all valid reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRank {
    pub model_id: String,
    /// Mean of the ranks assigned by reviewers that ranked this model.
    /// Lower is better.
    pub mean_rank: f64,
    /// Number of reviewers that ranked this model.
    pub reviewer_count: usize,
}

/// Compute mean ranks over reviews with `parse_ok = true`.
///
/// Returned best-first (ascending mean), ties broken lexicographically
/// by model id. Reviews that failed to parse contribute nothing.
pub fn aggregate_rankings(reviews: &[ReviewResult]) -> Vec<AggregatedRank> {
    let mut tallies: BTreeMap<&str, (u64, usize)> = BTreeMap::new();

    for review in reviews.iter().filter(|r| r.parse_ok) {
        for ranking in &review.rankings {
            let tally = tallies.entry(ranking.model_id.as_str()).or_insert((0, 0));
            tally.0 += u64::from(ranking.rank);
            tally.1 += 1;
        }
    }

    let mut aggregated: Vec<AggregatedRank> = tallies
        .into_iter()
        .map(|(model_id, (sum, count))| AggregatedRank {
            model_id: model_id.to_string(),
            mean_rank: sum as f64 / count as f64,
            reviewer_count: count,
        })
        .collect();

    aggregated.sort_by(|a, b| {
        a.mean_rank
            .partial_cmp(&b.mean_rank)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.model_id.cmp(&b.model_id))
    });

    aggregated
}
