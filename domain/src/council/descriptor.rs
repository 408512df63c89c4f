//! Model descriptor value object.

use serde::{Deserialize, Serialize};

/// A model known to the council (Value Object).
///
/// Descriptors are created at process start from static configuration and
/// never mutated. Within a registry exactly one descriptor is the
/// chairman; the chairman is also eligible as a regular councilor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique model identifier, as sent to the provider (e.g. "gpt-4o").
    pub id: String,
    /// Human-readable name for display surfaces.
    pub display_name: String,
    /// Tag selecting the provider client (e.g. "openai", "openrouter").
    pub provider_tag: String,
    /// Whether this model performs the final synthesis.
    pub is_chairman: bool,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>, provider_tag: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = display_name_for(&id);
        Self {
            id,
            display_name,
            provider_tag: provider_tag.into(),
            is_chairman: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn chairman(mut self) -> Self {
        self.is_chairman = true;
        self
    }
}

/// Derive a display name from a provider-style model id.
///
/// Strips an organization prefix and a `:variant` suffix, so
/// `"arcee-ai/trinity-large:free"` becomes `"trinity-large"`.
pub fn display_name_for(id: &str) -> String {
    let name = id.rsplit('/').next().unwrap_or(id);
    let name = name.split(':').next().unwrap_or(name);
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_strips_prefix_and_suffix() {
        assert_eq!(display_name_for("arcee-ai/trinity-large:free"), "trinity-large");
        assert_eq!(display_name_for("gpt-4o"), "gpt-4o");
        assert_eq!(display_name_for("deepseek/deepseek-r1"), "deepseek-r1");
    }

    #[test]
    fn test_builder() {
        let d = ModelDescriptor::new("z-ai/glm-4.5-air:free", "openrouter");
        assert_eq!(d.display_name, "glm-4.5-air");
        assert!(!d.is_chairman);

        let d = ModelDescriptor::new("gpt-4o", "openai")
            .with_display_name("GPT-4o")
            .chairman();
        assert_eq!(d.display_name, "GPT-4o");
        assert!(d.is_chairman);
    }
}
