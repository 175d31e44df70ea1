//! Persistent domain records for jobs, verification requests, documents, and
//! the audit trail.
//!
//! These are plain serde structs; all persistence goes through
//! [`super::StateStore`] repository methods. Status strings are serialized in
//! their wire form (`"PENDING"`, `"COMPLETED"`, ...) so stored rows and API
//! responses agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate status of a business-central job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Verified,
    Flagged,
    Skipped,
    Error,
}

/// Lifecycle of a single verification invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Skipped,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Skipped | RequestStatus::Failed
        )
    }

    /// Allowed transitions form a DAG: PENDING → PROCESSING → terminal, with
    /// the short-circuit PENDING → terminal for requests rejected up front.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        match self {
            RequestStatus::Pending => next != RequestStatus::Pending,
            RequestStatus::Processing => next.is_terminal(),
            _ => false,
        }
    }
}

/// One row per business-central job number, created lazily on first reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub business_central_job_id: String,
    pub job_title: String,
    pub customer_name: String,
    pub status: JobStatus,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(business_central_job_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_central_job_id: business_central_job_id.into(),
            job_title: String::new(),
            customer_name: String::new(),
            status: JobStatus::Pending,
            last_processed_at: None,
        }
    }
}

/// One row per verification invocation. Terminal rows are immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// UUIDv7 so request ids sort by creation time.
    pub id: Uuid,
    pub job_no: String,
    pub request_timestamp: DateTime<Utc>,
    pub result_timestamp: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    /// Discrepancy strings; `None` only on non-terminal rows or a clean pass.
    pub discrepancies: Option<Vec<String>>,
}

impl VerificationRequest {
    pub fn new(job_no: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_no: job_no.into(),
            request_timestamp: Utc::now(),
            result_timestamp: None,
            status: RequestStatus::Pending,
            discrepancies: None,
        }
    }
}

/// Document type value stored before classification has run.
pub const UNCLASSIFIED: &str = "UNCLASSIFIED";

/// One row per `(job_no, file_name)`; blob bytes live in the blob store under
/// the same composite key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDocument {
    /// Monotonic insertion id; "latest" queries pick the maximum.
    pub id: u64,
    pub job_no: String,
    pub document_type: String,
    pub classified_document_type: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub description: String,
    pub related_job_id: Option<String>,
    pub user_identifier: Option<String>,
}

impl ActivityEvent {
    pub fn new(event_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            description: description.into(),
            related_job_id: None,
            user_identifier: None,
        }
    }

    pub fn for_job(mut self, job_no: impl Into<String>) -> Self {
        self.related_job_id = Some(job_no.into());
        self
    }

    pub fn by(mut self, user: impl Into<String>) -> Self {
        self.user_identifier = Some(user.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_status_dag() {
        use RequestStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Skipped.can_transition_to(Skipped));
    }

    #[test]
    fn status_wire_form_is_upper_snake() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Verified).unwrap(),
            "\"VERIFIED\""
        );
    }

    #[test]
    fn request_ids_sort_by_creation() {
        let first = VerificationRequest::new("J1");
        // UUIDv7 ordering is millisecond-granular
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = VerificationRequest::new("J1");
        assert!(second.id.to_string() > first.id.to_string());
    }
}
