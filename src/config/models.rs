use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub erp: ErpConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// HTTP server and data-directory configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Root directory for the embedded state store, queue, and document blobs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("queue")
    }

    pub fn blob_path(&self) -> PathBuf {
        self.data_dir.join("documents")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Business Central OData endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErpConfig {
    #[serde(default = "default_erp_base_url")]
    pub base_url: String,
    /// Web-service user (loaded from `ERP_USER`, never from the config file)
    #[serde(skip)]
    pub username: Option<String>,
    /// Web-service access key (loaded from `ERP_KEY`, never from the config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: ByteSize,
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: ByteSize,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            base_url: default_erp_base_url(),
            username: None,
            access_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
            max_document_bytes: default_max_document_bytes(),
        }
    }
}

fn default_erp_base_url() -> String {
    "http://localhost:7048/BC240/ODataV4/Company('CRONUS')".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_response_bytes() -> ByteSize {
    ByteSize(16 << 20)
}

fn default_max_document_bytes() -> ByteSize {
    ByteSize(32 << 20)
}

/// Multimodal verification service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_fallback_models")]
    pub fallback_models: Vec<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    /// Ordered model chain: primary first, then fallbacks.
    pub fn model_chain(&self) -> Vec<String> {
        let mut chain = Vec::with_capacity(1 + self.fallback_models.len());
        chain.push(self.primary_model.clone());
        chain.extend(self.fallback_models.iter().cloned());
        chain
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            primary_model: default_primary_model(),
            fallback_models: default_fallback_models(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_primary_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_fallback_models() -> Vec<String> {
    vec!["gemini-2.0-flash-lite-001".to_string()]
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_top_p() -> f32 {
    0.95
}

fn default_top_k() -> u32 {
    40
}

fn default_llm_timeout_secs() -> u64 {
    120
}

/// PDF page-render utility configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default = "default_converter_url")]
    pub converter_url: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_render_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            converter_url: default_converter_url(),
            dpi: default_dpi(),
            request_timeout_secs: default_render_timeout_secs(),
        }
    }
}

fn default_converter_url() -> String {
    "http://localhost:8017/render".to_string()
}

fn default_dpi() -> u32 {
    300
}

fn default_render_timeout_secs() -> u64 {
    60
}

/// Inbound verification queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// Number of listener tasks draining the broker
    #[serde(default = "default_queue_workers")]
    pub workers: usize,
    /// Per-worker channel capacity (the back-pressure bound)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_queue_workers(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_queue_workers() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    64
}

/// Orchestrator tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VerificationConfig {
    /// Per-request document worker pool size
    #[serde(default = "default_doc_concurrency")]
    pub doc_concurrency: usize,
    /// User string stamped on ERP write-back
    #[serde(default = "default_writeback_actor")]
    pub writeback_actor: String,
    /// Concurrency-token retry limit for ERP write-back
    #[serde(default = "default_writeback_max_retries")]
    pub writeback_max_retries: u32,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            doc_concurrency: default_doc_concurrency(),
            writeback_actor: default_writeback_actor(),
            writeback_max_retries: default_writeback_max_retries(),
        }
    }
}

fn default_doc_concurrency() -> usize {
    4
}

fn default_writeback_actor() -> String {
    "AI LLM Service".to_string()
}

fn default_writeback_max_retries() -> u32 {
    3
}
