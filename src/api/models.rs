//! API request/response types for the verification endpoints.
//!
//! All JSON field names are camelCase to match the consumers of the original
//! ERP workflow tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::state::{RequestStatus, VerificationRequest};

/// `POST /verify` body
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerifyJobBody {
    pub job_no: String,
}

/// 202 response for an accepted verification
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAcceptedResponse {
    pub verification_request_id: Uuid,
    pub job_no: String,
}

/// Verification request row as exposed over HTTP
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequestView {
    pub id: Uuid,
    pub job_no: String,
    pub request_timestamp: DateTime<Utc>,
    pub result_timestamp: Option<DateTime<Utc>>,
    pub status: RequestStatus,
    pub discrepancies: Option<Vec<String>>,
}

impl From<VerificationRequest> for VerificationRequestView {
    fn from(request: VerificationRequest) -> Self {
        Self {
            id: request.id,
            job_no: request.job_no,
            request_timestamp: request.request_timestamp,
            result_timestamp: request.result_timestamp,
            status: request.status,
            discrepancies: request.discrepancies,
        }
    }
}

/// `GET /verify/check-eligibility/{jobNo}` response
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResponse {
    pub is_eligible: bool,
    pub job_no: String,
    pub job_title: String,
    pub customer_name: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
