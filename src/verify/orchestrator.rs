//! The verification engine: one state machine per verification request.
//!
//! `process` drives a PENDING request through eligibility, reference-data
//! fetch, document acquisition, per-document classify+verify, aggregation,
//! optional ERP write-back, and the terminal commit. It returns only after
//! the terminal writes are durable (or after recording that they could not
//! be made so).

use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::VerificationConfig;
use crate::erp::{ErpApi, ErpError, ReferenceBundles, VerificationFields};
use crate::llm::DocumentVerifier;
use crate::observability::Metrics;
use crate::render::PageRenderer;
use crate::state::{
    ActivityEvent, Job, JobStatus, RequestStatus, StateStore, VerificationRequest,
};

use super::discrepancy::{Finding, Outcome, outcome, to_discrepancy_list};
use super::documents::{acquire_documents, verify_documents};
use super::eligibility::{self, SKIP_DISCREPANCY};

/// How the pipeline portion of a request ended.
enum PipelineEnd {
    Skipped { reason: String },
    Completed { findings: Vec<Finding>, outcome: Outcome },
    Failed { message: String },
}

pub struct Orchestrator {
    store: StateStore,
    erp: Arc<dyn ErpApi>,
    verifier: Arc<dyn DocumentVerifier>,
    renderer: Arc<dyn PageRenderer>,
    metrics: Arc<Metrics>,
    config: VerificationConfig,
}

impl Orchestrator {
    pub fn new(
        store: StateStore,
        erp: Arc<dyn ErpApi>,
        verifier: Arc<dyn DocumentVerifier>,
        renderer: Arc<dyn PageRenderer>,
        metrics: Arc<Metrics>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            store,
            erp,
            verifier,
            renderer,
            metrics,
            config,
        }
    }

    /// Drive one verification request to a terminal state.
    pub async fn process(&self, request_id: Uuid, job_no: &str) {
        // Load & guard
        let request = match self.store.get_request(request_id) {
            Ok(Some(request)) => request,
            Ok(None) => {
                error!(%request_id, job_no, "Verification request not found");
                let event = ActivityEvent::new(
                    "VERIFICATION_ERROR",
                    format!("Verification request {request_id} not found"),
                )
                .for_job(job_no);
                if let Err(err) = self.store.append_activity(&event) {
                    error!(%request_id, error = %err, "Failed to record error event");
                }
                return;
            }
            Err(err) => {
                error!(%request_id, job_no, error = %err, "Failed to load verification request");
                return;
            }
        };

        if request.status != RequestStatus::Pending {
            info!(
                %request_id,
                status = ?request.status,
                "Request already processed or in flight, skipping"
            );
            return;
        }

        let job_no = if request.job_no == job_no {
            request.job_no.clone()
        } else {
            warn!(
                %request_id,
                message_job = job_no,
                request_job = %request.job_no,
                "Job number mismatch between message and request, trusting the request"
            );
            request.job_no.clone()
        };

        // Resolve the job aggregate, creating it lazily
        let mut job = match self.store.get_job(&job_no) {
            Ok(Some(job)) => job,
            Ok(None) => Job::new(job_no.clone()),
            Err(err) => {
                error!(%request_id, job_no, error = %err, "Failed to load job aggregate");
                return;
            }
        };

        // Mark in-flight: the one atomic cross-partition write
        let mut request = request;
        request.status = RequestStatus::Processing;
        job.status = JobStatus::Processing;
        job.last_processed_at = Some(Utc::now());
        if let Err(err) = self.store.mark_processing(&request, &job) {
            error!(%request_id, job_no, error = %err, "Failed to mark request in flight");
            return;
        }

        info!(%request_id, job_no, "Verification started");
        self.record_event(
            ActivityEvent::new(
                "VERIFICATION_STARTED",
                format!("Second-check verification started for job {job_no}"),
            )
            .for_job(job_no.as_str()),
        );

        match self.run_pipeline(&mut job, &job_no).await {
            PipelineEnd::Skipped { reason } => {
                info!(%request_id, job_no, reason, "Job not eligible, skipping");
                request.status = RequestStatus::Skipped;
                request.result_timestamp = Some(Utc::now());
                request.discrepancies = Some(vec![SKIP_DISCREPANCY.to_string()]);
                job.status = JobStatus::Skipped;
                self.metrics.request_skipped();
                self.commit_terminal(
                    &request,
                    &job,
                    ActivityEvent::new(
                        "VERIFICATION_SKIPPED",
                        format!("Job {job_no} skipped: {reason}"),
                    )
                    .for_job(job_no.as_str()),
                );
            }
            PipelineEnd::Completed { findings, outcome } => {
                info!(%request_id, job_no, %outcome, findings = findings.len(), "Verification completed");
                request.status = RequestStatus::Completed;
                request.result_timestamp = Some(Utc::now());
                request.discrepancies = to_discrepancy_list(&findings);
                job.status = match outcome {
                    Outcome::Pass => JobStatus::Verified,
                    Outcome::Flagged => JobStatus::Flagged,
                };
                match outcome {
                    Outcome::Pass => self.metrics.request_verified(),
                    Outcome::Flagged => self.metrics.request_flagged(),
                }
                self.commit_terminal(
                    &request,
                    &job,
                    ActivityEvent::new(
                        "VERIFICATION_COMPLETED",
                        format!("Job {job_no} verification completed: {outcome}"),
                    )
                    .for_job(job_no.as_str())
                    .by(self.config.writeback_actor.as_str()),
                );
            }
            PipelineEnd::Failed { message } => {
                error!(%request_id, job_no, message, "Verification failed");
                request.status = RequestStatus::Failed;
                request.result_timestamp = Some(Utc::now());
                request.discrepancies = Some(vec![message.clone()]);
                job.status = JobStatus::Error;
                self.metrics.request_failed();
                self.commit_terminal(
                    &request,
                    &job,
                    ActivityEvent::new(
                        "VERIFICATION_FAILED",
                        format!("Job {job_no} verification failed: {message}"),
                    )
                    .for_job(job_no.as_str()),
                );
            }
        }
    }

    /// Steps 4–10: eligibility through write-back.
    async fn run_pipeline(&self, job: &mut Job, job_no: &str) -> PipelineEnd {
        // Eligibility
        let entry = match self.erp.fetch_job_list_entry(job_no).await {
            Ok(entry) => entry,
            Err(ErpError::NotFound(_)) => {
                return PipelineEnd::Failed {
                    message: format!("Job list entry not found for job {job_no}"),
                };
            }
            Err(err) => {
                return PipelineEnd::Failed {
                    message: format!("Failed to fetch job list entry for job {job_no}: {err}"),
                };
            }
        };
        job.job_title = entry.job_title.clone();
        job.customer_name = entry.customer_name.clone();

        let eligibility = eligibility::evaluate(&entry);
        if !eligibility.eligible {
            return PipelineEnd::Skipped {
                reason: eligibility.reason,
            };
        }

        // Ledger anchor
        let ledger = match self.erp.fetch_ledger_entries(job_no).await {
            Ok(entries) => entries,
            Err(err) => {
                return PipelineEnd::Failed {
                    message: format!("Failed to fetch ledger entries for job {job_no}: {err}"),
                };
            }
        };
        let Some(anchor) = ledger.into_iter().next() else {
            return PipelineEnd::Failed {
                message: format!("Ledger entry not found for job {job_no}"),
            };
        };

        // Reference bundles, fetched concurrently. Individual failures are
        // findings; losing every bundle is fatal.
        let quote_no = anchor.document_no.trim().to_string();
        let invoice_no = anchor.invoice_no.trim().to_string();

        let (quote_result, invoice_result, links_result) = tokio::join!(
            async {
                if quote_no.is_empty() {
                    None
                } else {
                    Some(self.erp.fetch_sales_quote(&quote_no).await)
                }
            },
            async {
                if invoice_no.is_empty() {
                    None
                } else {
                    Some(self.erp.fetch_sales_invoice(&invoice_no).await)
                }
            },
            self.erp.fetch_attachment_links(job_no),
        );

        let mut findings: Vec<Finding> = Vec::new();
        let mut bundles_attempted = 1usize; // attachment links are always fetched
        let mut bundles_missing = 0usize;

        let sales_quote = match quote_result {
            None => None,
            Some(Ok(quote)) => {
                bundles_attempted += 1;
                Some(quote)
            }
            Some(Err(err)) => {
                bundles_attempted += 1;
                bundles_missing += 1;
                warn!(job_no, quote_no, error = %err, "Sales quote unavailable");
                findings.push(Finding::flagging(format!(
                    "sales quote {quote_no} unavailable: {err}"
                )));
                None
            }
        };

        let sales_invoice = match invoice_result {
            None => None,
            Some(Ok(invoice)) => {
                bundles_attempted += 1;
                Some(invoice)
            }
            Some(Err(err)) => {
                bundles_attempted += 1;
                bundles_missing += 1;
                warn!(job_no, invoice_no, error = %err, "Sales invoice unavailable");
                findings.push(Finding::flagging(format!(
                    "sales invoice {invoice_no} unavailable: {err}"
                )));
                None
            }
        };

        let links = match links_result {
            Ok(links) => Some(links),
            Err(err) => {
                bundles_missing += 1;
                warn!(job_no, error = %err, "Attachment links unavailable");
                findings.push(Finding::flagging(format!(
                    "attachment links unavailable: {err}"
                )));
                None
            }
        };

        if bundles_missing == bundles_attempted {
            return PipelineEnd::Failed {
                message: format!("Reference data unavailable for job {job_no}"),
            };
        }

        let bundles = Arc::new(ReferenceBundles {
            job_no: job_no.to_string(),
            ledger_entry: anchor,
            sales_quote,
            sales_invoice,
        });

        // Document acquisition
        let urls = links.map(|l| l.urls()).unwrap_or_default();
        let (documents, acquisition_findings) =
            acquire_documents(&self.store, self.erp.as_ref(), job_no, &urls).await;
        findings.extend(acquisition_findings);

        // Per-document classify+verify
        let document_findings = verify_documents(
            &self.store,
            &self.verifier,
            &self.renderer,
            &bundles,
            documents,
            self.config.doc_concurrency,
        )
        .await;
        findings.extend(document_findings);

        // Aggregate. The verdict is fixed before write-back runs; a write-back
        // failure is surfaced but never demotes the outcome.
        let verdict = outcome(&findings);

        if verdict == Outcome::Pass {
            let fields = self.verification_fields(job_no);
            if let Err(err) = self.erp.update_verification_fields(job_no, &fields).await {
                warn!(job_no, error = %err, "ERP write-back failed");
                self.record_event(
                    ActivityEvent::new(
                        "ERP_WRITEBACK_FAILED",
                        format!("Job {job_no}: {err}"),
                    )
                    .for_job(job_no),
                );
                findings.push(Finding::advisory(format!("ERP write-back failed: {err}")));
            }
        }

        PipelineEnd::Completed {
            findings,
            outcome: verdict,
        }
    }

    fn verification_fields(&self, job_no: &str) -> VerificationFields {
        let now = Local::now();
        VerificationFields {
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            checker: self.config.writeback_actor.clone(),
            comment: format!("Job {job_no} passed verification with no discrepancies."),
        }
    }

    /// Commit the terminal state: job row, audit event, then the write-once
    /// request row with a durability flush. The request write is retried once;
    /// a second failure leaves the request in PROCESSING with an error event.
    fn commit_terminal(&self, request: &VerificationRequest, job: &Job, event: ActivityEvent) {
        if let Err(err) = self.store.upsert_job(job) {
            error!(request_id = %request.id, error = %err, "Failed to write job aggregate");
        }
        self.record_event(event);

        if let Err(first) = self.store.finalize_request(request) {
            warn!(request_id = %request.id, error = %first, "Terminal write failed, retrying once");
            if let Err(second) = self.store.finalize_request(request) {
                error!(
                    request_id = %request.id,
                    error = %second,
                    "Terminal write failed twice; request remains PROCESSING"
                );
                self.record_event(
                    ActivityEvent::new(
                        "TERMINAL_WRITE_FAILED",
                        format!(
                            "Request {} could not be finalized: {second}",
                            request.id
                        ),
                    )
                    .for_job(request.job_no.as_str()),
                );
            }
        }
    }

    fn record_event(&self, event: ActivityEvent) {
        if let Err(err) = self.store.append_activity(&event) {
            error!(event_type = %event.event_type, error = %err, "Failed to append activity event");
        }
    }
}
