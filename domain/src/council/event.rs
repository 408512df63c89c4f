//! Events delivered on the council output stream.
//!
//! Every producer in the orchestration sends only [`CouncilEvent`]
//! values; the wire form is one JSON object per line (NDJSON), tagged by
//! `type`.

use crate::council::review::Ranking;
use crate::council::stage::Stage;
use serde::{Deserialize, Serialize};

/// The `data` payload of a review event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewData {
    pub rankings: Vec<Ranking>,
    pub parse_ok: bool,
}

/// A single event on the output stream.
///
/// Ordering guarantees: stage updates appear strictly in stage order;
/// chunks for one model preserve production order; `complete` is the
/// last event of a successful turn; `error` without a `model_id` is
/// terminal, with a `model_id` it is a per-model soft failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouncilEvent {
    /// Announces entry into a stage.
    StageUpdate { stage: Stage, content: String },
    /// One streamed chunk of a councilor's first opinion.
    ModelResponse { model_id: String, content: String },
    /// One reviewer's complete (possibly unparseable) review.
    Review { model_id: String, data: ReviewData },
    /// One streamed chunk of the chairman's synthesis.
    FinalResponse { content: String },
    /// Terminal event of a successful turn.
    Complete,
    /// Soft per-model failure (`model_id` set) or terminal failure.
    Error {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model_id: Option<String>,
    },
}

impl CouncilEvent {
    pub fn stage_update(stage: Stage, content: impl Into<String>) -> Self {
        CouncilEvent::StageUpdate {
            stage,
            content: content.into(),
        }
    }

    /// A non-fatal failure attributed to one model.
    pub fn model_error(model_id: impl Into<String>, content: impl Into<String>) -> Self {
        CouncilEvent::Error {
            content: content.into(),
            model_id: Some(model_id.into()),
        }
    }

    /// A terminal failure for the whole turn.
    pub fn error(content: impl Into<String>) -> Self {
        CouncilEvent::Error {
            content: content.into(),
            model_id: None,
        }
    }

    /// True for `complete` and turn-level `error` events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CouncilEvent::Complete | CouncilEvent::Error { model_id: None, .. }
        )
    }

    /// Render as one newline-terminated NDJSON line.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_tags() {
        let event = CouncilEvent::stage_update(Stage::FirstOpinions, "go");
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"stage_update","stage":"first_opinions","content":"go"}"#
        );

        let event = CouncilEvent::ModelResponse {
            model_id: "m1".to_string(),
            content: "4".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"model_response","model_id":"m1","content":"4"}"#
        );

        assert_eq!(
            serde_json::to_string(&CouncilEvent::Complete).unwrap(),
            r#"{"type":"complete"}"#
        );
    }

    #[test]
    fn test_error_omits_absent_model_id() {
        let terminal = CouncilEvent::error("no_opinions");
        assert_eq!(
            serde_json::to_string(&terminal).unwrap(),
            r#"{"type":"error","content":"no_opinions"}"#
        );
        assert!(terminal.is_terminal());

        let soft = CouncilEvent::model_error("m2", "timeout");
        assert_eq!(
            serde_json::to_string(&soft).unwrap(),
            r#"{"type":"error","content":"timeout","model_id":"m2"}"#
        );
        assert!(!soft.is_terminal());
    }

    #[test]
    fn test_review_payload_round_trips() {
        let event = CouncilEvent::Review {
            model_id: "m1".to_string(),
            data: ReviewData {
                rankings: vec![Ranking {
                    model_id: "m2".to_string(),
                    rank: 1,
                    reasoning: "best".to_string(),
                }],
                parse_ok: true,
            },
        };
        let line = event.to_json_line().unwrap();
        assert!(line.ends_with('\n'));
        let back: CouncilEvent = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(back, event);
    }
}
