//! Configuration Validation
//!
//! Validates all configuration at startup.
//! Rejects invalid values with explicit error messages, collecting every
//! problem so an operator can fix them in one pass.

use std::str::FromStr;

/// Configuration validation errors
#[derive(Debug)]
pub struct ConfigValidationError {
    pub field: String,
    pub value: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid configuration for '{}': {} (value: {})",
            self.field, self.message, self.value
        )
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of config validation
pub type ConfigResult<T> = Result<T, Vec<ConfigValidationError>>;

/// Configuration validator
pub struct ConfigValidator {
    errors: Vec<ConfigValidationError>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error
    fn error(&mut self, field: &str, value: impl std::fmt::Display, message: &str) {
        self.errors.push(ConfigValidationError {
            field: field.to_string(),
            value: value.to_string(),
            message: message.to_string(),
        });
    }

    /// Parse a raw value, falling back to `default` when it is absent.
    ///
    /// An unparsable value is recorded and the default is returned so
    /// validation can continue.
    pub fn parse_or<T>(&mut self, field: &str, raw: Option<String>, default: T) -> T
    where
        T: FromStr,
    {
        match raw {
            None => default,
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => value,
                Err(_) => {
                    self.error(field, &raw, "Value could not be parsed");
                    default
                }
            },
        }
    }

    /// Require a value to be present
    pub fn require(&mut self, field: &str, raw: Option<String>) -> String {
        match raw {
            Some(value) => value,
            None => {
                self.error(field, "<unset>", "Value is required");
                String::new()
            }
        }
    }

    /// Validate port number (1-65535)
    pub fn validate_port(&mut self, field: &str, port: u16) -> &mut Self {
        if port == 0 {
            self.error(field, port, "Port must be between 1 and 65535");
        }
        self
    }

    /// Validate range (inclusive)
    pub fn validate_range(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.error(field, value, &format!("Value must be between {} and {}", min, max));
        }
        self
    }

    /// Validate non-empty string
    pub fn validate_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, value, "Value cannot be empty");
        }
        self
    }

    /// Validate minimum length of a secret without echoing it
    pub fn validate_secret_len(&mut self, field: &str, value: &str, min_len: usize) -> &mut Self {
        if value.len() < min_len {
            self.error(
                field,
                "<redacted>",
                &format!("Secret must be at least {} bytes", min_len),
            );
        }
        self
    }

    /// Validate that a value is one of the allowed choices
    pub fn validate_one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.error(
                field,
                value,
                &format!("Value must be one of: {}", allowed.join(", ")),
            );
        }
        self
    }

    /// Validate a cron expression
    pub fn validate_cron(&mut self, field: &str, expr: &str) -> &mut Self {
        if let Err(e) = crate::sweeper::parse_schedule(expr) {
            self.error(field, expr, &format!("Invalid cron expression: {}", e));
        }
        self
    }

    /// Finish validation and return result
    pub fn finish(self) -> ConfigResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Check if any errors occurred
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get current errors
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Format validation errors for display
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
