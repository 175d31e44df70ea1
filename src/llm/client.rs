use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::erp::ReferenceBundles;
use crate::render::PageImage;

use super::models::{GenerationParams, LlmVerdict, VerifyDocumentRequest};
use super::parse::parse_verdict;

/// Classify+verify seam consumed by the orchestrator.
///
/// Infallible by contract: model-chain exhaustion is folded into the verdict
/// (`documentType=UNKNOWN`, confidence 0, `error` set) so a dead LLM service
/// degrades a verification instead of failing it.
#[async_trait]
pub trait DocumentVerifier: Send + Sync {
    async fn classify_and_verify(
        &self,
        job_no: &str,
        pages: &[PageImage],
        bundles: &ReferenceBundles,
    ) -> LlmVerdict;
}

/// HTTP client for the multimodal verification service with ordered model
/// fallback. Stateless; shared across requests.
pub struct LlmClient {
    http: Client,
    base_url: String,
    models: Vec<String>,
    generation: GenerationParams,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.model_chain(),
            generation: GenerationParams {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
                top_p: config.top_p,
                top_k: config.top_k,
            },
        })
    }

    async fn attempt(
        &self,
        model: &str,
        job_no: &str,
        pages: &[PageImage],
        bundles: &ReferenceBundles,
    ) -> Result<LlmVerdict, String> {
        let request = VerifyDocumentRequest {
            model,
            job_no,
            images: pages,
            erp_bundles: bundles,
            generation: &self.generation,
        };

        let response = self
            .http
            .post(format!("{}/v1/verify", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("transport: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status().as_u16()));
        }

        let body = response.text().await.map_err(|e| format!("body: {e}"))?;
        parse_verdict(&body).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl DocumentVerifier for LlmClient {
    async fn classify_and_verify(
        &self,
        job_no: &str,
        pages: &[PageImage],
        bundles: &ReferenceBundles,
    ) -> LlmVerdict {
        let mut last_error = String::from("no models configured");

        for model in &self.models {
            match self.attempt(model, job_no, pages, bundles).await {
                Ok(verdict) => {
                    debug!(job_no, model, document_type = %verdict.document_type, "Verdict received");
                    return verdict;
                }
                Err(error) => {
                    warn!(job_no, model, %error, "Model attempt failed, rolling over");
                    last_error = format!("{model}: {error}");
                }
            }
        }

        warn!(job_no, %last_error, "Model chain exhausted");
        LlmVerdict::unavailable(last_error)
    }
}
