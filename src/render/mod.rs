//! Page rendering for attached documents.
//!
//! Rasterization itself is an external utility reached over HTTP; this module
//! owns the contract around it. Before shipping bytes out, a cheap structural
//! preflight rejects blobs that cannot possibly render (empty, wrong magic,
//! encrypted). Preflight, transport, and zero-page failures all degrade to a
//! synthetic error page rather than an error, so a broken attachment still
//! flows through classification and surfaces as an unreadable page.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RenderConfig;

/// 1x1 PNG used when a page cannot be produced. The verification model reads
/// it as an unreadable page.
const SYNTHETIC_PAGE_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

/// One rendered page, base64 PNG, as sent to the verification model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub page_number: u32,
    /// Base64-encoded PNG (300 DPI RGB for real pages)
    pub data: String,
    #[serde(skip)]
    pub synthetic: bool,
}

impl PageImage {
    pub fn synthetic(page_number: u32) -> Self {
        Self {
            page_number,
            data: SYNTHETIC_PAGE_B64.to_string(),
            synthetic: true,
        }
    }
}

/// Pages that must all be treated as unreadable force an UNKNOWN
/// classification downstream.
pub fn all_synthetic(pages: &[PageImage]) -> bool {
    pages.iter().all(|p| p.synthetic)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightIssue {
    #[error("document is empty")]
    Empty,

    #[error("missing PDF magic header")]
    NotPdf,

    #[error("document is encrypted")]
    Encrypted,
}

/// Structural checks that are worth doing before a network round trip.
/// Zero-page documents are the converter's call; it sees the real structure.
pub fn preflight(bytes: &[u8]) -> Result<(), PreflightIssue> {
    if bytes.is_empty() {
        return Err(PreflightIssue::Empty);
    }
    if !bytes.starts_with(b"%PDF-") {
        return Err(PreflightIssue::NotPdf);
    }
    if contains(bytes, b"/Encrypt") {
        return Err(PreflightIssue::Encrypted);
    }
    Ok(())
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle)
}

/// Renderer seam: turns a document blob into page images, substituting
/// synthetic pages on failure. Infallible by contract.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, file_name: &str, bytes: Bytes) -> Vec<PageImage>;
}

#[derive(Debug, Deserialize)]
struct ConverterResponse {
    /// Base64 PNG per page
    #[serde(default)]
    pages: Vec<String>,
}

/// Renderer backed by the external PDF conversion utility.
pub struct HttpPageRenderer {
    http: Client,
    endpoint: String,
    dpi: u32,
}

impl HttpPageRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.converter_url.clone(),
            dpi: config.dpi,
        })
    }

    async fn convert(&self, bytes: Bytes) -> Result<Vec<String>, String> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("dpi", self.dpi.to_string()), ("format", "png".to_string())])
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("converter returned HTTP {}", response.status()));
        }
        let parsed: ConverterResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed.pages)
    }
}

#[async_trait]
impl PageRenderer for HttpPageRenderer {
    async fn render(&self, file_name: &str, bytes: Bytes) -> Vec<PageImage> {
        // Preflight is byte scanning; keep it off the network pool.
        let scan = bytes.clone();
        let checked = tokio::task::spawn_blocking(move || preflight(&scan)).await;

        match checked {
            Ok(Ok(())) => {}
            Ok(Err(issue)) => {
                warn!(file_name, %issue, "Preflight failed, substituting error page");
                return vec![PageImage::synthetic(1)];
            }
            Err(join_err) => {
                warn!(file_name, error = %join_err, "Preflight task failed");
                return vec![PageImage::synthetic(1)];
            }
        }

        match self.convert(bytes).await {
            Ok(pages) if pages.is_empty() => {
                warn!(file_name, "Converter produced zero pages");
                vec![PageImage::synthetic(1)]
            }
            Ok(pages) => {
                debug!(file_name, pages = pages.len(), "Rendered document");
                pages
                    .into_iter()
                    .enumerate()
                    .map(|(idx, data)| {
                        let page_number = idx as u32 + 1;
                        if data.is_empty() {
                            PageImage::synthetic(page_number)
                        } else {
                            PageImage {
                                page_number,
                                data,
                                synthetic: false,
                            }
                        }
                    })
                    .collect()
            }
            Err(error) => {
                warn!(file_name, %error, "Render failed, substituting error page");
                vec![PageImage::synthetic(1)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_rejects_invalid_blobs() {
        assert_eq!(preflight(b""), Err(PreflightIssue::Empty));
        assert_eq!(preflight(b"MZ\x90\x00"), Err(PreflightIssue::NotPdf));
        assert_eq!(
            preflight(b"%PDF-1.7 trailer /Encrypt 12 0 R"),
            Err(PreflightIssue::Encrypted)
        );
        assert_eq!(preflight(b"%PDF-1.7 1 0 obj"), Ok(()));
    }

    #[test]
    fn synthetic_pages_are_flagged() {
        let page = PageImage::synthetic(3);
        assert!(page.synthetic);
        assert_eq!(page.page_number, 3);
        assert!(!page.data.is_empty());

        assert!(all_synthetic(&[PageImage::synthetic(1)]));
        assert!(!all_synthetic(&[
            PageImage::synthetic(1),
            PageImage {
                page_number: 2,
                data: "abcd".to_string(),
                synthetic: false
            }
        ]));
    }

    #[test]
    fn synthetic_flag_stays_off_the_wire() {
        let value = serde_json::to_value(PageImage::synthetic(1)).unwrap();
        assert_eq!(value["pageNumber"], 1);
        assert!(value.get("synthetic").is_none());
    }
}
