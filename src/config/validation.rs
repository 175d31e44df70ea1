use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("llm model chain is empty (primary model blank with no fallbacks)")]
    EmptyModelChain,

    #[error("llm model chain contains a blank identifier")]
    BlankModelIdentifier,

    #[error("verification.doc_concurrency must be at least 1")]
    ZeroDocConcurrency,

    #[error("queue.workers must be at least 1")]
    ZeroQueueWorkers,

    #[error("queue.channel_capacity must be at least 1")]
    ZeroChannelCapacity,

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

/// Structural validation that cannot be expressed in serde defaults.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    let chain = config.llm.model_chain();
    if chain.iter().all(|m| m.trim().is_empty()) {
        return Err(ValidationError::EmptyModelChain);
    }
    if chain.iter().any(|m| m.trim().is_empty()) {
        return Err(ValidationError::BlankModelIdentifier);
    }

    if config.verification.doc_concurrency == 0 {
        return Err(ValidationError::ZeroDocConcurrency);
    }
    if config.queue.workers == 0 {
        return Err(ValidationError::ZeroQueueWorkers);
    }
    if config.queue.channel_capacity == 0 {
        return Err(ValidationError::ZeroChannelCapacity);
    }

    if config.erp.base_url.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "erp.base_url" });
    }
    if config.llm.base_url.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "llm.base_url" });
    }
    if config.verification.writeback_actor.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "verification.writeback_actor",
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_doc_concurrency() {
        let mut config = Config::default();
        config.verification.doc_concurrency = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroDocConcurrency)
        ));
    }

    #[test]
    fn rejects_blank_model_chain() {
        let mut config = Config::default();
        config.llm.primary_model = "  ".to_string();
        config.llm.fallback_models = vec![];
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyModelChain)
        ));
    }

    #[test]
    fn rejects_blank_fallback_entry() {
        let mut config = Config::default();
        config.llm.fallback_models = vec!["".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ValidationError::BlankModelIdentifier)
        ));
    }

    #[test]
    fn rejects_empty_actor() {
        let mut config = Config::default();
        config.verification.writeback_actor = String::new();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyField { .. })
        ));
    }
}
