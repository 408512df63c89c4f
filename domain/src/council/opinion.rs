//! First-opinion results from individual councilors.

use crate::core::clock::epoch_millis;
use serde::{Deserialize, Serialize};

/// A single councilor's answer from the first-opinions stage.
///
/// Exactly one of `text` / `error` is meaningful: `text` is empty
/// whenever `error` is set. The constructors enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOpinion {
    /// The model that produced (or failed to produce) this opinion.
    pub model_id: String,
    /// The accumulated response text; empty on failure.
    pub text: String,
    /// Error description if the call failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// When the opinion finished, in epoch milliseconds.
    pub finished_at: u64,
}

impl ModelOpinion {
    /// A successful opinion.
    pub fn success(model_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            text: text.into(),
            error: None,
            finished_at: epoch_millis(),
        }
    }

    /// A failed opinion. The text is always empty.
    pub fn failure(model_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            text: String::new(),
            error: Some(error.into()),
            finished_at: epoch_millis(),
        }
    }

    /// Returns `true` if the model answered without error.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
