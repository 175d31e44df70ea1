use axum::{Json, extract::Path, extract::State, response::IntoResponse};
use uuid::Uuid;

use super::error::ApiError;
use super::models::{
    EligibilityResponse, HealthResponse, VerificationRequestView, VerifyAcceptedResponse,
    VerifyJobBody,
};
use super::state::AppState;
use crate::queue::VerifyJobMessage;
use crate::state::VerificationRequest;
use crate::verify::evaluate;

/// Verification intake (POST /verify)
///
/// Creates a PENDING VerificationRequest row, persists the queue payload, and
/// dispatches it to the listener pool. Returns 202; the caller polls
/// `GET /verify/{id}` for the terminal state.
pub async fn submit_verification(
    State(state): State<AppState>,
    Json(body): Json<VerifyJobBody>,
) -> Result<impl IntoResponse, ApiError> {
    let job_no = body.job_no.trim().to_string();
    if job_no.is_empty() {
        return Err(ApiError::InvalidPayload("jobNo must not be empty".into()));
    }

    let request = VerificationRequest::new(job_no.clone());
    state.store.create_request(&request)?;

    let message = VerifyJobMessage {
        verification_request_id: request.id.to_string(),
        job_no: job_no.clone(),
    };
    let payload = serde_json::to_vec(&message)
        .map_err(|e| ApiError::Internal(format!("payload encoding failed: {e}")))?;

    state
        .broker
        .enqueue(payload)
        .await
        .map_err(|e| ApiError::Internal(format!("enqueue failed: {e}")))?;

    state.metrics.request_accepted();

    let response = VerifyAcceptedResponse {
        verification_request_id: request.id,
        job_no,
    };
    Ok((axum::http::StatusCode::ACCEPTED, Json(response)))
}

/// Verification status (GET /verify/{id})
pub async fn get_verification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .store
        .get_request(id)?
        .ok_or_else(|| ApiError::NotFound(format!("verification request {id}")))?;

    Ok(Json(VerificationRequestView::from(request)))
}

/// Latest verification for a job (GET /verify/job/{jobNo}/latest)
pub async fn latest_for_job(
    State(state): State<AppState>,
    Path(job_no): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .store
        .latest_request_for_job(job_no.trim())?
        .ok_or_else(|| ApiError::NotFound(format!("no verification requests for job {job_no}")))?;

    Ok(Json(VerificationRequestView::from(request)))
}

/// Eligibility probe (GET /verify/check-eligibility/{jobNo})
///
/// Reads the ERP job-list entry and applies the second-check rules without
/// creating any state.
pub async fn check_eligibility(
    State(state): State<AppState>,
    Path(job_no): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_no = job_no.trim().to_string();
    if job_no.is_empty() {
        return Err(ApiError::InvalidPayload("jobNo must not be empty".into()));
    }

    let entry = state.erp.fetch_job_list_entry(&job_no).await?;
    let eligibility = evaluate(&entry);

    Ok(Json(EligibilityResponse {
        is_eligible: eligibility.eligible,
        job_no: entry.job_no,
        job_title: entry.job_title,
        customer_name: entry.customer_name,
        message: eligibility.reason,
    }))
}

/// Health check endpoint (GET /health)
///
/// Probes the embedded stores and the listener channels. Returns 503 when any
/// component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();
    components.insert(
        "state_store".to_string(),
        health_label(state.store.health_check().is_ok()),
    );
    components.insert(
        "queue".to_string(),
        health_label(state.queue.health_check().is_ok()),
    );
    components.insert(
        "listeners".to_string(),
        health_label(state.broker.health_check()),
    );

    let all_healthy = components.values().all(|status| status == "healthy");
    let status_code = if all_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

fn health_label(healthy: bool) -> String {
    if healthy { "healthy" } else { "unhealthy" }.to_string()
}
