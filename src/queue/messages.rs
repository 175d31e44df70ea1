//! Inbound payload decoding.
//!
//! The canonical payload is a JSON object `{"verificationRequestId", "jobNo"}`.
//! Two legacy producer quirks must be tolerated: the same object arriving
//! doubly encoded (a JSON string whose value is the object's JSON text), and a
//! bare job-number JSON string used as a manual trigger. Anything else is a
//! dead-letter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyJobMessage {
    pub verification_request_id: String,
    pub job_no: String,
}

/// Decoded inbound command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    /// Process an existing PENDING verification request.
    Verify(VerifyJobMessage),
    /// Legacy shorthand: spawn a fresh request for this job and process it.
    ManualTrigger { job_no: String },
}

#[derive(Debug, Error)]
pub enum MessageParseError {
    #[error("payload is not JSON: {0}")]
    Syntax(String),

    #[error("payload field must not be empty: {0}")]
    EmptyField(&'static str),

    #[error("payload shape not recognized")]
    UnknownShape,
}

/// Decode a raw queue payload.
pub fn parse_payload(payload: &[u8]) -> Result<InboundCommand, MessageParseError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| MessageParseError::Syntax(e.to_string()))?;

    match value {
        Value::Object(_) => decode_message(value),
        Value::String(inner) => {
            // Doubly-encoded object, or a bare job number used as a trigger
            match serde_json::from_str::<Value>(&inner) {
                Ok(unwrapped @ Value::Object(_)) => decode_message(unwrapped),
                _ => {
                    let job_no = inner.trim();
                    if job_no.is_empty() {
                        Err(MessageParseError::EmptyField("jobNo"))
                    } else {
                        Ok(InboundCommand::ManualTrigger {
                            job_no: job_no.to_string(),
                        })
                    }
                }
            }
        }
        _ => Err(MessageParseError::UnknownShape),
    }
}

fn decode_message(value: Value) -> Result<InboundCommand, MessageParseError> {
    let message: VerifyJobMessage =
        serde_json::from_value(value).map_err(|e| MessageParseError::Syntax(e.to_string()))?;
    if message.verification_request_id.trim().is_empty() {
        return Err(MessageParseError::EmptyField("verificationRequestId"));
    }
    if message.job_no.trim().is_empty() {
        return Err(MessageParseError::EmptyField("jobNo"));
    }
    Ok(InboundCommand::Verify(message))
}
