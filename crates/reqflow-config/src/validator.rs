//! Configuration validation.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::schema::{BackendKind, Config};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_queue(config, &mut result);
        Self::validate_store(config, &mut result);
        Self::validate_provider(config, &mut result);
        Self::validate_submitter(config, &mut result);
        Self::validate_poller(config, &mut result);
        Self::validate_templates(config, &mut result);

        result
    }

    fn validate_queue(config: &Config, result: &mut ValidationResult) {
        let queue = &config.queue;
        if queue.backend == BackendKind::Sqlite && queue.db_path.is_none() {
            result.add_error(ValidationError::new(
                "queue.db_path",
                "db_path is required for the sqlite backend",
            ));
        }

        let mut seen = HashSet::new();
        for name in queue.names() {
            if name.is_empty() {
                result.add_error(ValidationError::new("queue", "Queue names cannot be empty"));
            } else if !seen.insert(name) {
                result.add_error(ValidationError::new(
                    "queue",
                    format!("Queue name '{}' is used more than once", name),
                ));
            }
        }
    }

    fn validate_store(config: &Config, result: &mut ValidationResult) {
        if config.store.backend == BackendKind::Sqlite && config.store.db_path.is_none() {
            result.add_error(ValidationError::new(
                "store.db_path",
                "db_path is required for the sqlite backend",
            ));
        }
    }

    fn validate_provider(config: &Config, result: &mut ValidationResult) {
        let provider = &config.provider;
        if !provider.base_url.starts_with("http://") && !provider.base_url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "provider.base_url",
                "base_url must start with http:// or https://",
            ));
        }

        if provider.catalog.is_empty() {
            result.add_warning(ValidationWarning::new(
                "provider.catalog",
                "catalog is not set, submissions will be rejected by the provider",
            ));
        }

        if provider.token.is_none() && provider.token_env.is_none() {
            result.add_warning(ValidationWarning::new(
                "provider.token",
                "Neither token nor token_env is set, requests will be sent unauthenticated",
            ));
        }
    }

    fn validate_submitter(config: &Config, result: &mut ValidationResult) {
        let submitter = &config.submitter;
        if submitter.batch_size == 0 {
            result.add_error(ValidationError::new(
                "submitter.batch_size",
                "batch_size must be greater than 0",
            ));
        }

        if submitter.min_wait_secs == 0 {
            result.add_error(ValidationError::new(
                "submitter.min_wait_secs",
                "min_wait_secs must be greater than 0",
            ));
        }

        if submitter.min_wait_secs > submitter.max_wait_secs {
            result.add_error(ValidationError::new(
                "submitter.max_wait_secs",
                "max_wait_secs must not be lower than min_wait_secs",
            ));
        }
    }

    fn validate_poller(config: &Config, result: &mut ValidationResult) {
        let poller = &config.poller;
        if poller.poll_interval_secs == 0 {
            result.add_error(ValidationError::new(
                "poller.poll_interval_secs",
                "poll_interval_secs must be greater than 0",
            ));
        } else if poller.poll_interval_secs < 5 {
            result.add_warning(ValidationWarning::new(
                "poller.poll_interval_secs",
                "Polling more often than every 5 seconds is likely to be rate limited",
            ));
        }

        if poller.max_poll_attempts == Some(0) {
            result.add_error(ValidationError::new(
                "poller.max_poll_attempts",
                "max_poll_attempts must be greater than 0 when set",
            ));
        }
    }

    fn validate_templates(config: &Config, result: &mut ValidationResult) {
        let mut commands = HashSet::new();
        for (i, template) in config.templates.iter().enumerate() {
            let command = template.command.to_uppercase();
            if command.is_empty() {
                result.add_error(ValidationError::new(
                    format!("templates[{}].command", i),
                    "command cannot be empty",
                ));
            } else if matches!(command.as_str(), "EXIT" | "PAUSE" | "RESUME" | "CLR_QUEUES") {
                result.add_error(ValidationError::new(
                    format!("templates[{}].command", i),
                    format!("'{}' is a reserved control command", command),
                ));
            } else if !commands.insert(command.clone()) {
                result.add_error(ValidationError::new(
                    format!("templates[{}].command", i),
                    format!("Duplicate template command '{}'", command),
                ));
            }

            if template.fields.is_empty() {
                result.add_warning(ValidationWarning::new(
                    format!("templates[{}].fields", i),
                    "Template requests no fields",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
