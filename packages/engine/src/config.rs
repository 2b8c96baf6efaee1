use formloom_descriptor::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormConfig {
    /// Debounce window for free-text fields
    pub text_debounce_ms: u64,

    /// Debounce window for checkboxes, radios, selects
    pub discrete_debounce_ms: u64,

    /// Delay between apply-queue retries
    pub apply_retry_delay_ms: u64,

    /// Retries before a waiting commit goes ahead regardless
    pub apply_max_attempts: u32,

    /// How often the async driver polls pending computes
    pub compute_poll_interval_ms: u64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            text_debounce_ms: 300,
            discrete_debounce_ms: 0,
            apply_retry_delay_ms: 10,
            apply_max_attempts: 5,
            compute_poll_interval_ms: 16,
        }
    }
}

impl FormConfig {
    pub fn debounce_for(&self, descriptor: &FieldDescriptor) -> Duration {
        if let Some(window) = descriptor.debounce {
            return window;
        }
        if descriptor.kind.is_discrete() {
            Duration::from_millis(self.discrete_debounce_ms)
        } else {
            Duration::from_millis(self.text_debounce_ms)
        }
    }

    pub fn apply_retry_delay(&self) -> Duration {
        Duration::from_millis(self.apply_retry_delay_ms)
    }

    pub fn compute_poll_interval(&self) -> Duration {
        Duration::from_millis(self.compute_poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_config() {
        let json = r#"{ "textDebounceMs": 120, "applyMaxAttempts": 2 }"#;
        let config: FormConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.text_debounce_ms, 120);
        assert_eq!(config.apply_max_attempts, 2);
        assert_eq!(config.discrete_debounce_ms, 0);
        assert_eq!(config.apply_retry_delay_ms, 10);
    }

    #[test]
    fn test_debounce_by_kind() {
        let config = FormConfig::default();
        assert_eq!(
            config.debounce_for(&FieldDescriptor::text("a")),
            Duration::from_millis(300)
        );
        assert_eq!(
            config.debounce_for(&FieldDescriptor::checkbox("a")),
            Duration::ZERO
        );
        assert_eq!(
            config.debounce_for(
                &FieldDescriptor::text("a").with_debounce(Duration::from_millis(5))
            ),
            Duration::from_millis(5)
        );
    }
}
