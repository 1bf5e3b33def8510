//! Configuration validation
//!
//! Validates GraphCache configuration for correctness:
//! - Valid API URL
//! - Non-zero timeouts, page limits and concurrency
//! - A usable store path
//! - Token environment variable naming

use super::graphcache_config::GraphCacheConfig;
use crate::GraphCacheError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub section: Option<String>,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            section: None,
            field: field.into(),
            message: message.into(),
        }
    }

    fn in_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref section) = self.section {
            write!(f, "{}.{}: {}", section, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a GraphCache configuration, collecting every problem found
pub fn validate_config(config: &GraphCacheConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.store.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("path", "Store path cannot be empty").in_section("store"));
    }

    let api = &config.graph_api;
    if !api.base_url.starts_with("http://") && !api.base_url.starts_with("https://") {
        errors.push(
            ValidationError::new("base_url", format!("Invalid API URL: {}", api.base_url))
                .in_section("graph_api"),
        );
    }

    if api.timeout_secs == 0 {
        errors.push(
            ValidationError::new("timeout_secs", "Timeout must be greater than 0")
                .in_section("graph_api"),
        );
    }

    if api.max_edge_pages == 0 {
        errors.push(
            ValidationError::new("max_edge_pages", "At least one page must be allowed")
                .in_section("graph_api"),
        );
    }

    if api.access_token.is_none() {
        if api.access_token_env.is_empty() {
            errors.push(
                ValidationError::new(
                    "access_token_env",
                    "Token environment variable name cannot be empty",
                )
                .in_section("graph_api"),
            );
        } else if std::env::var(&api.access_token_env).is_err() {
            tracing::warn!(
                env_var = %api.access_token_env,
                "Environment variable not set (this may be intentional if set at runtime)"
            );
        }
    }

    if config.sync.concurrency == 0 {
        errors.push(
            ValidationError::new("concurrency", "Concurrency must be greater than 0")
                .in_section("sync"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &GraphCacheConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        GraphCacheError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
