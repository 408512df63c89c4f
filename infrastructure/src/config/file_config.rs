//! TOML configuration schema (`council.toml`).
//!
//! # Example
//!
//! ```toml
//! [council]
//! chairman = "gpt-4o"
//! default_models = ["gpt-4o", "z-ai/glm-4.5-air:free"]
//! temperature = 0.7
//!
//! [[council.models]]
//! id = "gpt-4o"
//! provider = "openai"
//! name = "GPT-4o"
//!
//! [[council.models]]
//! id = "z-ai/glm-4.5-air:free"
//! provider = "openrouter"
//!
//! [limits]
//! per_call_timeout_ms = 120000
//! turn_deadline_ms = 600000
//!
//! [storage]
//! path = "./data/conversations.json"
//! ```

use council_application::CouncilConfig;
use council_domain::ModelDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One problem found while validating a [`FileConfig`].
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub message: String,
}

impl ConfigIssue {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// One model in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModelEntry {
    /// Provider-facing model id.
    pub id: String,
    /// Which provider client serves this model ("openai", "openrouter").
    pub provider: String,
    /// Display name override.
    #[serde(default)]
    pub name: Option<String>,
}

/// `[council]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCouncilConfig {
    /// The model performing the final synthesis. Must be in the catalog.
    pub chairman: String,
    /// Councilors used when a request selects none; empty means all.
    pub default_models: Vec<String>,
    pub temperature: f32,
    pub review_temperature: f32,
    pub max_tokens: u32,
    /// The model catalog.
    pub models: Vec<FileModelEntry>,
}

impl Default for FileCouncilConfig {
    fn default() -> Self {
        Self {
            chairman: "gpt-4o".to_string(),
            default_models: Vec::new(),
            temperature: 0.7,
            review_temperature: 0.3,
            max_tokens: 4000,
            models: default_catalog(),
        }
    }
}

fn default_catalog() -> Vec<FileModelEntry> {
    let entry = |id: &str, provider: &str| FileModelEntry {
        id: id.to_string(),
        provider: provider.to_string(),
        name: None,
    };
    vec![
        entry("gpt-4o", "openai"),
        entry("arcee-ai/trinity-large-preview:free", "openrouter"),
        entry("tngtech/deepseek-r1t2-chimera:free", "openrouter"),
        entry("z-ai/glm-4.5-air:free", "openrouter"),
        entry("deepseek/deepseek-r1-0528:free", "openrouter"),
    ]
}

/// `[providers.openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenAiConfig {
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Direct API key (not recommended; use the env var instead).
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for FileOpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// `[providers.openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOpenRouterConfig {
    pub api_key_env: String,
    pub api_key: Option<String>,
    pub base_url: String,
    /// Optional `HTTP-Referer` attribution header.
    pub referer: Option<String>,
    /// Optional `X-Title` attribution header.
    pub title: Option<String>,
}

impl Default for FileOpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            referer: None,
            title: None,
        }
    }
}

/// `[providers]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    pub openai: FileOpenAiConfig,
    pub openrouter: FileOpenRouterConfig,
}

/// `[limits]` section. All durations in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLimitsConfig {
    pub per_call_timeout_ms: u64,
    pub stage1_deadline_ms: u64,
    pub stage2_deadline_ms: u64,
    pub stage3_deadline_ms: u64,
    pub turn_deadline_ms: u64,
    pub output_buffer_size: usize,
}

impl Default for FileLimitsConfig {
    fn default() -> Self {
        Self {
            per_call_timeout_ms: 120_000,
            stage1_deadline_ms: 180_000,
            stage2_deadline_ms: 120_000,
            stage3_deadline_ms: 180_000,
            turn_deadline_ms: 600_000,
            output_buffer_size: 128,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    pub path: String,
}

impl Default for FileStorageConfig {
    fn default() -> Self {
        Self {
            path: "./data/conversations.json".to_string(),
        }
    }
}

/// The full configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub council: FileCouncilConfig,
    pub providers: FileProvidersConfig,
    pub limits: FileLimitsConfig,
    pub storage: FileStorageConfig,
}

impl FileConfig {
    /// Build the model catalog as typed descriptors.
    pub fn to_descriptors(&self) -> Vec<ModelDescriptor> {
        self.council
            .models
            .iter()
            .map(|entry| {
                let mut descriptor = ModelDescriptor::new(&entry.id, &entry.provider);
                if let Some(name) = &entry.name {
                    descriptor = descriptor.with_display_name(name);
                }
                if entry.id == self.council.chairman {
                    descriptor = descriptor.chairman();
                }
                descriptor
            })
            .collect()
    }

    /// Build the runtime orchestrator configuration.
    pub fn to_council_config(&self) -> CouncilConfig {
        CouncilConfig::new(&self.council.chairman)
            .with_default_models(self.council.default_models.clone())
            .with_temperature(self.council.temperature)
            .with_max_tokens(self.council.max_tokens)
            .with_per_call_timeout(Duration::from_millis(self.limits.per_call_timeout_ms))
            .with_stage_deadlines(
                Duration::from_millis(self.limits.stage1_deadline_ms),
                Duration::from_millis(self.limits.stage2_deadline_ms),
                Duration::from_millis(self.limits.stage3_deadline_ms),
            )
            .with_turn_deadline(Duration::from_millis(self.limits.turn_deadline_ms))
            .with_output_buffer_size(self.limits.output_buffer_size)
    }

    /// Validate the file-level configuration.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.council.models.is_empty() {
            issues.push(ConfigIssue::error("council.models: no models configured"));
        }
        if self.council.chairman.trim().is_empty() {
            issues.push(ConfigIssue::error("council.chairman: must not be empty"));
        } else if !self
            .council
            .models
            .iter()
            .any(|m| m.id == self.council.chairman)
        {
            issues.push(ConfigIssue::error(format!(
                "council.chairman: {} is not in the model catalog",
                self.council.chairman
            )));
        }

        for id in &self.council.default_models {
            if !self.council.models.iter().any(|m| &m.id == id) {
                issues.push(ConfigIssue::warning(format!(
                    "council.default_models: {} is not in the model catalog",
                    id
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.council.temperature) {
            issues.push(ConfigIssue::error(format!(
                "council.temperature: {} outside 0.0..=1.0",
                self.council.temperature
            )));
        }
        if self.council.max_tokens == 0 {
            issues.push(ConfigIssue::error("council.max_tokens: must be positive"));
        }
        if self.limits.output_buffer_size == 0 {
            issues.push(ConfigIssue::error(
                "limits.output_buffer_size: must be positive",
            ));
        }

        issues
    }

    /// True when any issue is an error.
    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FileConfig::default();
        let issues = config.validate();
        assert!(!FileConfig::has_errors(&issues), "{issues:?}");
        assert_eq!(config.council.chairman, "gpt-4o");
        assert!(config.council.models.len() >= 2);
    }

    #[test]
    fn test_partial_toml_merges_with_defaults() {
        let toml_str = r#"
[council]
chairman = "my-model"

[[council.models]]
id = "my-model"
provider = "openai"
name = "Mine"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.council.chairman, "my-model");
        assert_eq!(config.council.models.len(), 1);
        assert_eq!(config.council.temperature, 0.7);
        assert_eq!(config.limits.turn_deadline_ms, 600_000);
        assert!(!FileConfig::has_errors(&config.validate()));
    }

    #[test]
    fn test_descriptor_mapping_marks_chairman() {
        let config = FileConfig::default();
        let descriptors = config.to_descriptors();
        let chairmen: Vec<_> = descriptors.iter().filter(|d| d.is_chairman).collect();
        assert_eq!(chairmen.len(), 1);
        assert_eq!(chairmen[0].id, "gpt-4o");
        assert_eq!(chairmen[0].provider_tag, "openai");

        let glm = descriptors
            .iter()
            .find(|d| d.id == "z-ai/glm-4.5-air:free")
            .unwrap();
        assert_eq!(glm.display_name, "glm-4.5-air");
    }

    #[test]
    fn test_council_config_mapping() {
        let toml_str = r#"
[limits]
per_call_timeout_ms = 1000
stage1_deadline_ms = 2000
stage2_deadline_ms = 3000
stage3_deadline_ms = 4000
turn_deadline_ms = 5000
output_buffer_size = 7
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let council = config.to_council_config();
        assert_eq!(council.per_call_timeout, Duration::from_secs(1));
        assert_eq!(council.stage1_deadline, Duration::from_secs(2));
        assert_eq!(council.stage2_deadline, Duration::from_secs(3));
        assert_eq!(council.stage3_deadline, Duration::from_secs(4));
        assert_eq!(council.turn_deadline, Duration::from_secs(5));
        assert_eq!(council.output_buffer_size, 7);
        assert!(council.validate().is_ok());
    }

    #[test]
    fn test_validate_flags_unknown_chairman() {
        let toml_str = r#"
[council]
chairman = "ghost"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        assert!(FileConfig::has_errors(&issues));
        assert!(issues.iter().any(|i| i.message.contains("ghost")));
    }

    #[test]
    fn test_validate_warns_on_unknown_default_model() {
        let toml_str = r#"
[council]
default_models = ["nope"]
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        assert!(!FileConfig::has_errors(&issues));
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Warning && i.message.contains("nope")));
    }
}
