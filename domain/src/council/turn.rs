//! A complete council turn: one user message and its three-stage record.

use crate::core::clock::epoch_millis;
use crate::council::opinion::ModelOpinion;
use crate::council::review::ReviewResult;
use serde::{Deserialize, Serialize};

/// The persisted record of one deliberation turn.
///
/// Created when orchestration starts and written to the store exactly
/// once: on success, or after a non-recoverable error that still
/// produced at least one stage's artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilTurn {
    pub turn_id: String,
    pub user_message: String,
    pub opinions: Vec<ModelOpinion>,
    pub reviews: Vec<ReviewResult>,
    /// The chairman's synthesis; may be a truncated prefix.
    pub final_text: String,
    pub started_at: u64,
    pub finished_at: u64,
}

impl CouncilTurn {
    pub fn new(turn_id: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            turn_id: turn_id.into(),
            user_message: user_message.into(),
            opinions: Vec::new(),
            reviews: Vec::new(),
            final_text: String::new(),
            started_at: epoch_millis(),
            finished_at: 0,
        }
    }

    /// Mark the turn finished now.
    pub fn finish(&mut self) {
        self.finished_at = epoch_millis();
    }

    /// Iterate over opinions that completed without error.
    pub fn successful_opinions(&self) -> impl Iterator<Item = &ModelOpinion> {
        self.opinions.iter().filter(|o| o.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_opinions_filter() {
        let mut turn = CouncilTurn::new("t1", "what is 2+2?");
        turn.opinions.push(ModelOpinion::success("m1", "4"));
        turn.opinions.push(ModelOpinion::failure("m2", "timeout"));
        assert_eq!(turn.successful_opinions().count(), 1);
    }

    #[test]
    fn test_finish_stamps_time() {
        let mut turn = CouncilTurn::new("t1", "q");
        assert_eq!(turn.finished_at, 0);
        turn.finish();
        assert!(turn.finished_at >= turn.started_at);
    }
}
