//! Configuration management for the second-check service
//!
//! Layered configuration:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file (`config/secondcheck.toml`, overridable via
//!    `SECONDCHECK_CONFIG`)
//! 3. Environment variables with the pattern `SECONDCHECK__<section>__<key>`
//! 4. Deployment environment keys (`ERP_BASE_URL`, `ERP_USER`,
//!    `ERP_KEY`, `LLM_BASE_URL`, `LLM_MODEL_PRIMARY`, `LLM_MODEL_FALLBACKS`,
//!    `WRITEBACK_ACTOR`, `DOC_CONCURRENCY`), highest priority
//!
//! Credentials are only ever read from the environment, never from TOML.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    Config, ErpConfig, LlmConfig, QueueConfig, RenderConfig, ServerConfig, VerificationConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[erp]
base_url = "https://bc.example/ODataV4/Company('CRONUS')"

[llm]
base_url = "https://verifier.example"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(
            config.erp.base_url,
            "https://bc.example/ODataV4/Company('CRONUS')"
        );
        assert_eq!(config.llm.base_url, "https://verifier.example");
    }

    #[test]
    fn validation_catches_bad_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[verification]
doc_concurrency = 0
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroDocConcurrency)
        ));
    }
}
