//! Deliberation stages.

use serde::{Deserialize, Serialize};

/// Stage of a council turn.
///
/// The orchestrator announces stages strictly in declaration order;
/// stages that produce no work still emit their announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// All councilors answer the question in parallel.
    FirstOpinions,
    /// Councilors rank each other's anonymized answers.
    Review,
    /// The chairman synthesizes the final answer.
    FinalResponse,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FirstOpinions => "first_opinions",
            Stage::Review => "review",
            Stage::FinalResponse => "final_response",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::FirstOpinions => "First Opinions",
            Stage::Review => "Peer Review",
            Stage::FinalResponse => "Final Response",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
