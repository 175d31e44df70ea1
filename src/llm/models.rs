//! Wire types for the multimodal verification service.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::erp::ReferenceBundles;
use crate::render::PageImage;

/// Recognized document classes plus the unreadable/unclassifiable bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    SalesQuote,
    ProformaInvoice,
    JobConsumption,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::SalesQuote => "SALES_QUOTE",
            DocumentType::ProformaInvoice => "PROFORMA_INVOICE",
            DocumentType::JobConsumption => "JOB_CONSUMPTION",
            DocumentType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrepancy severity; anything unrecognized is treated as advisory except
/// clearly escalating words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn is_advisory(&self) -> bool {
        matches!(self, Severity::Low)
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Severity::from_wire(&raw))
    }
}

/// One field-level mismatch reported by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmDiscrepancy {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub document_value: String,
    #[serde(default)]
    pub erp_value: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
}

fn default_severity() -> Severity {
    Severity::Low
}

/// Per-field extraction confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfidence {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub extracted_value: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

/// Classification + verification result for one document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LlmVerdict {
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub classification_confidence: f32,
    #[serde(default)]
    pub classification_reasoning: String,
    #[serde(default)]
    pub discrepancies: Vec<LlmDiscrepancy>,
    #[serde(default)]
    pub field_confidences: Vec<FieldConfidence>,
    #[serde(default)]
    pub overall_verification_confidence: f32,
    /// Set when the model chain was exhausted and no verdict was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LlmVerdict {
    /// Verdict representing model-chain exhaustion.
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            document_type: DocumentType::Unknown,
            classification_confidence: 0.0,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Keyword-scan fallback verdict: type guess at half confidence, no
    /// discrepancy claims.
    pub fn keyword_guess(document_type: DocumentType) -> Self {
        Self {
            document_type,
            classification_confidence: 0.5,
            ..Self::default()
        }
    }

    /// Force the unreadable-document shape: UNKNOWN at zero confidence.
    pub fn force_unknown(&mut self) {
        self.document_type = DocumentType::Unknown;
        self.classification_confidence = 0.0;
    }
}

/// Sampling parameters sent with every model attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

/// Full classify+verify request body for one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyDocumentRequest<'a> {
    pub model: &'a str,
    pub job_no: &'a str,
    pub images: &'a [PageImage],
    pub erp_bundles: &'a ReferenceBundles,
    pub generation: &'a GenerationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_wire_types_fold_to_unknown() {
        let verdict: LlmVerdict =
            serde_json::from_str(r#"{"documentType": "SOMETHING_NEW"}"#).unwrap();
        assert_eq!(verdict.document_type, DocumentType::Unknown);
    }

    #[test]
    fn severity_from_wire_is_conservative() {
        assert_eq!(Severity::from_wire("HIGH"), Severity::High);
        assert_eq!(Severity::from_wire("critical"), Severity::High);
        assert_eq!(Severity::from_wire("Moderate"), Severity::Medium);
        assert_eq!(Severity::from_wire("info"), Severity::Low);
        assert_eq!(Severity::from_wire(""), Severity::Low);
    }

    #[test]
    fn verdict_parses_full_wire_shape() {
        let raw = r#"{
            "documentType": "SALES_QUOTE",
            "classificationConfidence": 0.93,
            "classificationReasoning": "Header says Quote",
            "discrepancies": [
                {
                    "field_name": "total_amount",
                    "document_value": "1100.00",
                    "erp_value": "1000.00",
                    "severity": "high",
                    "description": "totals differ"
                }
            ],
            "fieldConfidences": [
                {"field_name": "total_amount", "confidence": 0.9, "extracted_value": "1100.00", "verified": false}
            ],
            "overallVerificationConfidence": 0.88
        }"#;
        let verdict: LlmVerdict = serde_json::from_str(raw).unwrap();
        assert_eq!(verdict.document_type, DocumentType::SalesQuote);
        assert_eq!(verdict.discrepancies.len(), 1);
        assert_eq!(verdict.discrepancies[0].severity, Severity::High);
        assert_eq!(verdict.field_confidences.len(), 1);
        assert!(verdict.error.is_none());
    }

    #[test]
    fn unavailable_shape() {
        let verdict = LlmVerdict::unavailable("all models failed");
        assert_eq!(verdict.document_type, DocumentType::Unknown);
        assert_eq!(verdict.classification_confidence, 0.0);
        assert!(verdict.discrepancies.is_empty());
        assert_eq!(verdict.error.as_deref(), Some("all models failed"));
    }
}
