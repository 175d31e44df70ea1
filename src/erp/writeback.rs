//! Concurrency-token write-back loop for second-check fields.
//!
//! Business Central guards updates with an `@odata.etag`. The adapter re-reads
//! the entity before every attempt, presents the captured token via
//! `If-Match`, and retries on a token mismatch up to the configured limit.
//! Giving up yields a [`WriteBackError`], which callers treat as advisory.

use reqwest::StatusCode;
use reqwest::header::IF_MATCH;
use tracing::{debug, warn};

use super::client::ErpClient;
use super::error::{ErpError, WriteBackError};
use super::models::{JobListEntry, VerificationFields};

pub(super) async fn update_with_retry(
    client: &ErpClient,
    job_no: &str,
    fields: &VerificationFields,
) -> Result<(), WriteBackError> {
    let max_retries = client.writeback_max_retries().max(1);
    let mut last_error = ErpError::Transport("write-back not attempted".to_string());

    for attempt in 1..=max_retries {
        let etag = match read_etag(client, job_no).await {
            Ok(etag) => etag,
            Err(err) => {
                warn!(job_no, attempt, error = %err, "Write-back read failed");
                last_error = err;
                continue;
            }
        };

        match patch_fields(client, job_no, &etag, fields).await {
            Ok(()) => {
                debug!(job_no, attempt, "Second-check fields written");
                return Ok(());
            }
            Err(ErpError::Transport(msg)) if is_concurrency_mismatch(&msg) => {
                warn!(job_no, attempt, "Concurrency token mismatch, re-reading");
                last_error = ErpError::Transport(msg);
            }
            Err(err) => {
                // Only token mismatches are worth another round trip
                return Err(WriteBackError {
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }

    Err(WriteBackError {
        attempts: max_retries,
        source: last_error,
    })
}

async fn read_etag(client: &ErpClient, job_no: &str) -> Result<String, ErpError> {
    let mut rows: Vec<JobListEntry> = client
        .get_filtered("JobListEntries", "Job_No", job_no)
        .await?;
    if rows.is_empty() {
        return Err(ErpError::NotFound(format!("job list entry {job_no}")));
    }
    let entry = rows.swap_remove(0);
    if entry.etag.is_empty() {
        return Err(ErpError::Parse(format!(
            "job list entry {job_no} carried no @odata.etag"
        )));
    }
    Ok(entry.etag)
}

async fn patch_fields(
    client: &ErpClient,
    job_no: &str,
    etag: &str,
    fields: &VerificationFields,
) -> Result<(), ErpError> {
    let (user, key) = client.credentials();
    let url = client.entity_url(&format!("JobListEntries('{}')", job_no.replace('\'', "''")));

    let response = client
        .http()
        .patch(url)
        .basic_auth(user, Some(key))
        .header(IF_MATCH, etag)
        .json(&fields.to_patch_body())
        .send()
        .await?;

    match response.status() {
        StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => Err(ErpError::Transport(
            concurrency_mismatch_message(response.status()),
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ErpError::Auth),
        StatusCode::NOT_FOUND => Err(ErpError::NotFound(format!("job list entry {job_no}"))),
        status if !status.is_success() => {
            Err(ErpError::Transport(format!("HTTP {}", status.as_u16())))
        }
        _ => Ok(()),
    }
}

const MISMATCH_PREFIX: &str = "concurrency token mismatch";

fn concurrency_mismatch_message(status: StatusCode) -> String {
    format!("{} (HTTP {})", MISMATCH_PREFIX, status.as_u16())
}

fn is_concurrency_mismatch(message: &str) -> bool {
    message.starts_with(MISMATCH_PREFIX)
}
