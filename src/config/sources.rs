use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "SECONDCHECK_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/secondcheck.toml";
const ENV_PREFIX: &str = "SECONDCHECK";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. `SECONDCHECK__*` environment overrides
/// 5. Deployment environment keys (`ERP_BASE_URL`, ...), highest priority
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;

    load_secrets(&mut config);
    apply_plain_env(&mut config);

    Ok(config)
}

/// Load secrets from environment variables into config.
/// Credentials are never stored in TOML files, only in environment.
fn load_secrets(config: &mut Config) {
    if let Ok(user) = env::var("ERP_USER") {
        config.erp.username = Some(user);
    }
    if let Ok(key) = env::var("ERP_KEY") {
        config.erp.access_key = Some(key);
    }
}

/// Plain environment keys used by operations tooling. These are the documented
/// deployment contract and beat any file or prefixed-env value.
fn apply_plain_env(config: &mut Config) {
    if let Ok(url) = env::var("ERP_BASE_URL") {
        config.erp.base_url = url;
    }
    if let Ok(url) = env::var("LLM_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Ok(model) = env::var("LLM_MODEL_PRIMARY") {
        config.llm.primary_model = model;
    }
    if let Ok(fallbacks) = env::var("LLM_MODEL_FALLBACKS") {
        config.llm.fallback_models = fallbacks
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();
    }
    if let Ok(actor) = env::var("WRITEBACK_ACTOR") {
        config.verification.writeback_actor = actor;
    }
    if let Ok(concurrency) = env::var("DOC_CONCURRENCY") {
        match concurrency.parse::<usize>() {
            Ok(n) => config.verification.doc_concurrency = n,
            Err(_) => {
                tracing::warn!(value = %concurrency, "ignoring unparseable DOC_CONCURRENCY")
            }
        }
    }
}

/// Load configuration from a specific path and environment.
/// Useful for testing with custom config files.
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // SECONDCHECK__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
