//! Input Security Gate
//!
//! Validation for untrusted prompt text before it reaches any provider.
//! The router consults this gate ahead of strategy selection; a rejection
//! becomes a validation error and no backend is ever contacted.
//!
//! All validation is fail-safe: when in doubt, reject the input.

use serde::{Deserialize, Serialize};

/// Limits applied to inbound prompts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum prompt length in characters
    pub max_prompt_chars: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_prompt_chars: 32_768,
        }
    }
}

/// Result of validating one prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is acceptable
    Valid,
    /// Input is rejected with a reason
    Invalid(String),
}

impl ValidationResult {
    /// Whether the input passed validation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Rejection reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(reason) => Some(reason),
        }
    }
}

/// Validates prompt text against the configured limits.
pub struct InputValidator {
    config: SecurityConfig,
}

impl InputValidator {
    /// Create a validator with the given limits.
    #[must_use]
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Validate a prompt: non-empty, within the length bound, and free of
    /// control characters other than whitespace.
    pub fn validate_prompt(&self, prompt: &str) -> ValidationResult {
        if prompt.trim().is_empty() {
            return ValidationResult::Invalid("prompt is empty".to_string());
        }

        let chars = prompt.chars().count();
        if chars > self.config.max_prompt_chars {
            return ValidationResult::Invalid(format!(
                "prompt too long: {} characters (max: {})",
                chars, self.config.max_prompt_chars
            ));
        }

        if prompt
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return ValidationResult::Invalid(
                "prompt contains invalid control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(SecurityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_prompt() {
        let validator = InputValidator::default();
        assert!(validator.validate_prompt("write a sort function").is_valid());
    }

    #[test]
    fn test_rejects_empty_prompt() {
        let validator = InputValidator::default();
        assert!(!validator.validate_prompt("   \n  ").is_valid());
    }

    #[test]
    fn test_rejects_overlong_prompt() {
        let validator = InputValidator::new(SecurityConfig {
            max_prompt_chars: 10,
        });
        let result = validator.validate_prompt("this prompt is longer than ten characters");
        assert!(result.reason().unwrap().contains("too long"));
    }

    #[test]
    fn test_rejects_control_characters() {
        let validator = InputValidator::default();
        assert!(!validator.validate_prompt("hello\u{0007}world").is_valid());
        // Ordinary whitespace is fine
        assert!(validator.validate_prompt("line one\nline two\ttabbed").is_valid());
    }
}
