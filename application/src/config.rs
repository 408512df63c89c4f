//! Runtime configuration for the council orchestrator.

use std::time::Duration;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("chairman_model_id must not be empty")]
    MissingChairman,

    #[error("temperature {0} outside 0.0..=1.0")]
    TemperatureOutOfRange(f32),

    #[error("max_tokens must be greater than zero")]
    ZeroMaxTokens,

    #[error("output_buffer_size must be greater than zero")]
    ZeroBufferSize,
}

/// Tuning knobs for one orchestrator instance.
///
/// Durations are deadlines, not retries: the core performs no automatic
/// retries. `default_models` is the councilor set used when a request
/// does not select models; empty means "all registry models".
#[derive(Debug, Clone)]
pub struct CouncilConfig {
    /// The model performing stage-3 synthesis.
    pub chairman_model_id: String,
    /// Councilors used when the request omits `selected_models`.
    pub default_models: Vec<String>,
    /// Sampling temperature for opinions and synthesis.
    pub temperature: f32,
    /// Lower temperature used for peer reviews.
    pub review_temperature: f32,
    pub max_tokens: u32,
    /// Enforced by each model client on every call.
    pub per_call_timeout: Duration,
    pub stage1_deadline: Duration,
    pub stage2_deadline: Duration,
    pub stage3_deadline: Duration,
    /// Overall turn budget, counted from orchestrator entry.
    pub turn_deadline: Duration,
    /// Capacity of the bounded output channel; a full buffer suspends
    /// producers so a slow consumer throttles model streaming.
    pub output_buffer_size: usize,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            chairman_model_id: String::new(),
            default_models: Vec::new(),
            temperature: 0.7,
            review_temperature: 0.3,
            max_tokens: 4000,
            per_call_timeout: Duration::from_secs(120),
            stage1_deadline: Duration::from_secs(180),
            stage2_deadline: Duration::from_secs(120),
            stage3_deadline: Duration::from_secs(180),
            turn_deadline: Duration::from_secs(600),
            output_buffer_size: 128,
        }
    }
}

impl CouncilConfig {
    pub fn new(chairman_model_id: impl Into<String>) -> Self {
        Self {
            chairman_model_id: chairman_model_id.into(),
            ..Default::default()
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_default_models(mut self, models: Vec<String>) -> Self {
        self.default_models = models;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_per_call_timeout(mut self, timeout: Duration) -> Self {
        self.per_call_timeout = timeout;
        self
    }

    pub fn with_stage_deadlines(mut self, stage1: Duration, stage2: Duration, stage3: Duration) -> Self {
        self.stage1_deadline = stage1;
        self.stage2_deadline = stage2;
        self.stage3_deadline = stage3;
        self
    }

    pub fn with_turn_deadline(mut self, deadline: Duration) -> Self {
        self.turn_deadline = deadline;
        self
    }

    pub fn with_output_buffer_size(mut self, size: usize) -> Self {
        self.output_buffer_size = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chairman_model_id.trim().is_empty() {
            return Err(ConfigError::MissingChairman);
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::TemperatureOutOfRange(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.review_temperature) {
            return Err(ConfigError::TemperatureOutOfRange(self.review_temperature));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        if self.output_buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CouncilConfig::new("gpt-4o");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.review_temperature, 0.3);
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.per_call_timeout, Duration::from_secs(120));
        assert_eq!(config.turn_deadline, Duration::from_secs(600));
        assert_eq!(config.output_buffer_size, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CouncilConfig::new("m1")
            .with_default_models(vec!["m1".to_string(), "m2".to_string()])
            .with_temperature(0.2)
            .with_max_tokens(512)
            .with_output_buffer_size(8);
        assert_eq!(config.default_models.len(), 2);
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.output_buffer_size, 8);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            CouncilConfig::new("").validate(),
            Err(ConfigError::MissingChairman)
        ));
        assert!(matches!(
            CouncilConfig::new("m").with_temperature(1.5).validate(),
            Err(ConfigError::TemperatureOutOfRange(_))
        ));
        assert!(matches!(
            CouncilConfig::new("m").with_max_tokens(0).validate(),
            Err(ConfigError::ZeroMaxTokens)
        ));
        assert!(matches!(
            CouncilConfig::new("m").with_output_buffer_size(0).validate(),
            Err(ConfigError::ZeroBufferSize)
        ));
    }
}
