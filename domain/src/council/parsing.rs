//! Review reply parsing for the peer-review stage.
//!
//! These functions extract ranking structures from free-form reviewer
//! replies. They are pure domain logic: no I/O, no session management,
//! just line pattern matching against the anonymization map.
//!
//! Reviewers are asked to reply with lines of the form
//! `Rank N: <label> — <reasoning>`; the parser is tolerant of the common
//! drift (`#1: A`, `1. A`, `2) Response B`, `:` or `-` separators,
//! arbitrary casing).

use crate::council::opinion::ModelOpinion;
use crate::council::review::{Ranking, ReviewResult};
use regex::Regex;
use std::sync::LazyLock;

/// Injective mapping from anonymous labels (A, B, ...) to model ids.
///
/// Built over the non-error opinions of a turn in a canonical order
/// (model id ascending), so every reviewer sees the same labels.
#[derive(Debug, Clone)]
pub struct LabelMap {
    model_ids: Vec<String>,
}

impl LabelMap {
    /// Build the map from a turn's opinions, keeping only non-error ones.
    pub fn from_opinions(opinions: &[ModelOpinion]) -> Self {
        let mut model_ids: Vec<String> = opinions
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.model_id.clone())
            .collect();
        model_ids.sort();
        model_ids.dedup();
        Self { model_ids }
    }

    pub fn len(&self) -> usize {
        self.model_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.model_ids.is_empty()
    }

    /// The label assigned to a model, if it is in the map.
    pub fn label_of(&self, model_id: &str) -> Option<char> {
        self.model_ids
            .iter()
            .position(|id| id == model_id)
            .map(|i| (b'A' + i as u8) as char)
    }

    /// The model behind a label. Case-insensitive.
    pub fn model_for(&self, label: char) -> Option<&str> {
        let index = (label.to_ascii_uppercase() as u8).checked_sub(b'A')? as usize;
        self.model_ids.get(index).map(String::as_str)
    }

    /// Iterate `(label, model_id)` pairs in label order.
    pub fn entries(&self) -> impl Iterator<Item = (char, &str)> + '_ {
        self.model_ids
            .iter()
            .enumerate()
            .map(|(i, id)| ((b'A' + i as u8) as char, id.as_str()))
    }
}

/// Matches one ranking line: `Rank 1: B — reasoning`, `#2: A - ...`,
/// `3. C: ...`, `4) Response D`. The trailing reasoning is optional.
static RANK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:rank\s*)?#?\s*(\d+)\s*[.:)\]]\s*(?:response\s+)?([a-z])\b\s*(?:[—–:\-]\s*)?(.*)$")
        .expect("rank line pattern is valid")
});

/// Parse a reviewer's raw reply into a [`ReviewResult`].
///
/// Rules:
/// 1. Lines matching the rank pattern are mapped back to model ids via
///    the label map; unknown labels are skipped.
/// 2. Entries naming the reviewer itself are dropped.
/// 3. Duplicate model ids keep the first occurrence in the text.
/// 4. If fewer than half of the labels the reviewer was expected to rank
///    were matched, the review is marked `parse_ok = false` with empty
///    rankings (the raw text is still recorded).
/// 5. Surviving entries are ordered by their stated rank (ties by order
///    of appearance) and renumbered to a contiguous `1..=k`.
pub fn parse_review(reviewer_model_id: &str, labels: &LabelMap, raw_text: &str) -> ReviewResult {
    // Labels the reviewer is expected to rank: all except its own.
    let own = labels.label_of(reviewer_model_id);
    let expected = labels.len() - usize::from(own.is_some());

    // (stated rank, appearance index, model id, reasoning)
    let mut entries: Vec<(u32, usize, String, String)> = Vec::new();

    for (appearance, line) in raw_text.lines().enumerate() {
        let Some(caps) = RANK_LINE.captures(line) else {
            continue;
        };
        let Ok(rank) = caps[1].parse::<u32>() else {
            continue;
        };
        let Some(label) = caps[2].chars().next() else {
            continue;
        };
        let Some(model_id) = labels.model_for(label) else {
            continue;
        };
        if model_id == reviewer_model_id {
            continue;
        }
        if entries.iter().any(|(_, _, id, _)| id == model_id) {
            continue;
        }
        entries.push((
            rank,
            appearance,
            model_id.to_string(),
            caps[3].trim().to_string(),
        ));
    }

    if entries.len() * 2 < expected {
        return ReviewResult::failed(reviewer_model_id, raw_text);
    }

    entries.sort_by_key(|&(rank, appearance, _, _)| (rank, appearance));

    let rankings = entries
        .into_iter()
        .enumerate()
        .map(|(i, (_, _, model_id, reasoning))| Ranking {
            model_id,
            rank: i as u32 + 1,
            reasoning,
        })
        .collect();

    ReviewResult {
        reviewer_model_id: reviewer_model_id.to_string(),
        rankings,
        raw_text: raw_text.to_string(),
        parse_ok: true,
    }
}
