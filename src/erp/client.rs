use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ErpConfig;

use super::error::{ErpError, Result, WriteBackError};
use super::models::{
    DownloadedDocument, JobAttachmentLinks, JobLedgerEntry, JobListEntry, ODataCollection,
    SalesInvoiceHeader, SalesQuote, SalesQuoteHeader, SalesQuoteLine, VerificationFields,
};
use super::writeback;

const USER_AGENT: &str = concat!("secondcheck/", env!("CARGO_PKG_VERSION"));

/// ERP read/write surface consumed by the orchestrator and API.
///
/// All fetch operations are idempotent and side-effect-free; the single write
/// operation is the second-check field update behind the concurrency-token
/// retry loop.
#[async_trait]
pub trait ErpApi: Send + Sync {
    async fn fetch_job_list_entry(&self, job_no: &str) -> Result<JobListEntry>;

    async fn fetch_ledger_entries(&self, job_no: &str) -> Result<Vec<JobLedgerEntry>>;

    async fn fetch_sales_quote(&self, quote_no: &str) -> Result<SalesQuote>;

    async fn fetch_sales_invoice(&self, invoice_no: &str) -> Result<SalesInvoiceHeader>;

    async fn fetch_attachment_links(&self, job_no: &str) -> Result<JobAttachmentLinks>;

    async fn download_document(&self, url: &str) -> Result<DownloadedDocument>;

    async fn update_verification_fields(
        &self,
        job_no: &str,
        fields: &VerificationFields,
    ) -> std::result::Result<(), WriteBackError>;
}

/// Business Central OData client.
///
/// Stateless apart from the shared connection pool; one instance is shared
/// across every in-flight verification.
pub struct ErpClient {
    http: Client,
    base_url: String,
    username: String,
    access_key: String,
    max_response_bytes: u64,
    max_document_bytes: u64,
    writeback_max_retries: u32,
}

impl ErpClient {
    pub fn new(config: &ErpConfig, writeback_max_retries: u32) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ErpError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone().unwrap_or_default(),
            access_key: config.access_key.clone().unwrap_or_default(),
            max_response_bytes: config.max_response_bytes.as_u64(),
            max_document_bytes: config.max_document_bytes.as_u64(),
            writeback_max_retries,
        })
    }

    pub(super) fn entity_url(&self, entity: &str) -> String {
        format!("{}/{}", self.base_url, entity)
    }

    pub(super) fn writeback_max_retries(&self) -> u32 {
        self.writeback_max_retries
    }

    /// GET one OData collection with a `$filter` on a single field.
    pub(super) async fn get_filtered<T: DeserializeOwned>(
        &self,
        entity: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>> {
        let response = self
            .http
            .get(self.entity_url(entity))
            .basic_auth(&self.username, Some(&self.access_key))
            .query(&[("$filter", format!("{} eq '{}'", field, escape_odata(value)))])
            .send()
            .await?;

        let body = self.checked_body(response, self.max_response_bytes).await?;
        let collection: ODataCollection<T> = serde_json::from_slice(&body)?;
        debug!(entity, field, value, rows = collection.value.len(), "ERP fetch");
        Ok(collection.value)
    }

    /// Validate status and read a size-capped body.
    pub(super) async fn checked_body(&self, response: Response, cap: u64) -> Result<Bytes> {
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ErpError::Auth),
            StatusCode::NOT_FOUND => {
                return Err(ErpError::NotFound(response.url().path().to_string()));
            }
            status if !status.is_success() => {
                return Err(ErpError::Transport(format!("HTTP {}", status.as_u16())));
            }
            _ => {}
        }

        if let Some(length) = response.content_length() {
            if length > cap {
                return Err(ErpError::Transport(format!(
                    "response too large: {} bytes (cap {})",
                    length, cap
                )));
            }
        }
        let bytes = response.bytes().await?;
        if bytes.len() as u64 > cap {
            return Err(ErpError::Transport(format!(
                "response too large: {} bytes (cap {})",
                bytes.len(),
                cap
            )));
        }
        Ok(bytes)
    }

    pub(super) fn http(&self) -> &Client {
        &self.http
    }

    pub(super) fn credentials(&self) -> (&str, &str) {
        (&self.username, &self.access_key)
    }
}

#[async_trait]
impl ErpApi for ErpClient {
    async fn fetch_job_list_entry(&self, job_no: &str) -> Result<JobListEntry> {
        let mut rows: Vec<JobListEntry> = self
            .get_filtered("JobListEntries", "Job_No", job_no)
            .await?;
        if rows.is_empty() {
            return Err(ErpError::NotFound(format!("job list entry {job_no}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn fetch_ledger_entries(&self, job_no: &str) -> Result<Vec<JobLedgerEntry>> {
        self.get_filtered("JobLedgerEntries", "Job_No", job_no).await
    }

    async fn fetch_sales_quote(&self, quote_no: &str) -> Result<SalesQuote> {
        let mut headers: Vec<SalesQuoteHeader> =
            self.get_filtered("SalesQuotes", "No", quote_no).await?;
        if headers.is_empty() {
            return Err(ErpError::NotFound(format!("sales quote {quote_no}")));
        }
        let lines: Vec<SalesQuoteLine> = self
            .get_filtered("SalesQuoteLines", "Document_No", quote_no)
            .await?;
        Ok(SalesQuote {
            header: headers.swap_remove(0),
            lines,
        })
    }

    async fn fetch_sales_invoice(&self, invoice_no: &str) -> Result<SalesInvoiceHeader> {
        let mut rows: Vec<SalesInvoiceHeader> =
            self.get_filtered("SalesInvoices", "No", invoice_no).await?;
        if rows.is_empty() {
            return Err(ErpError::NotFound(format!("sales invoice {invoice_no}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn fetch_attachment_links(&self, job_no: &str) -> Result<JobAttachmentLinks> {
        let mut rows: Vec<JobAttachmentLinks> = self
            .get_filtered("JobAttachmentLinks", "Job_No", job_no)
            .await?;
        if rows.is_empty() {
            // No attachment row simply means no documents were linked
            return Ok(JobAttachmentLinks {
                job_no: job_no.to_string(),
                attachment_links: String::new(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    async fn download_document(&self, url: &str) -> Result<DownloadedDocument> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.access_key))
            .send()
            .await?;

        let file_name = file_name_for(url, &response);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok())
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| mime::APPLICATION_PDF.essence_str().to_string());

        let bytes = self.checked_body(response, self.max_document_bytes).await?;
        debug!(url, %file_name, size = bytes.len(), "Downloaded document");

        Ok(DownloadedDocument {
            file_name,
            content_type,
            bytes,
        })
    }

    async fn update_verification_fields(
        &self,
        job_no: &str,
        fields: &VerificationFields,
    ) -> std::result::Result<(), WriteBackError> {
        writeback::update_with_retry(self, job_no, fields).await
    }
}

/// OData string literals escape `'` by doubling it.
fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

/// Best-effort file name: Content-Disposition first, URL path tail otherwise.
fn file_name_for(url: &str, response: &Response) -> String {
    if let Some(disposition) = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
    {
        for part in disposition.split(';') {
            if let Some(name) = part.trim().strip_prefix("filename=") {
                let name = name.trim_matches('"').trim();
                if !name.is_empty() {
                    return name.to_string();
                }
            }
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let tail = path.rsplit('/').next().unwrap_or(path);
    if tail.is_empty() {
        "document.pdf".to_string()
    } else {
        tail.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odata_escaping_doubles_quotes() {
        assert_eq!(escape_odata("J'06"), "J''06");
        assert_eq!(escape_odata("plain"), "plain");
    }

    #[test]
    fn url_tail_fallback_for_file_names() {
        // file_name_for needs a Response for the header path; the URL-tail
        // branch is what we can exercise without a server.
        let path = "https://sp.example/sites/docs/quote%204.pdf?web=1";
        let tail = path.split(['?', '#']).next().unwrap();
        assert_eq!(tail.rsplit('/').next().unwrap(), "quote%204.pdf");
    }
}
