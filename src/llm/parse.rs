//! Tolerant parsing of model responses.
//!
//! Models are asked for bare JSON but routinely wrap it in prose or a
//! markdown code fence. Candidates are tried in order: the whole body, the
//! first fenced block, then the outermost brace span. If no candidate
//! deserializes, a keyword scan salvages a classification-only verdict.

use thiserror::Error;

use super::models::{DocumentType, LlmVerdict};

#[derive(Debug, Error)]
pub enum ResponseParseError {
    #[error("response body is empty")]
    Empty,

    #[error("no JSON verdict found in response: {0}")]
    NoJson(String),
}

/// Parse a model response body into a verdict.
pub fn parse_verdict(body: &str) -> Result<LlmVerdict, ResponseParseError> {
    if body.trim().is_empty() {
        return Err(ResponseParseError::Empty);
    }

    for candidate in candidates(body) {
        if let Ok(verdict) = serde_json::from_str::<LlmVerdict>(candidate) {
            return Ok(verdict);
        }
    }

    match keyword_scan(body) {
        Some(document_type) => Ok(LlmVerdict::keyword_guess(document_type)),
        None => Err(ResponseParseError::NoJson(preview(body))),
    }
}

/// JSON candidates in decreasing order of trust.
fn candidates(body: &str) -> impl Iterator<Item = &str> {
    let whole = Some(body.trim());
    let fenced = fenced_block(body);
    let braced = brace_span(body);
    whole.into_iter().chain(fenced).chain(braced)
}

/// Contents of the first ```json (or bare ```) fence.
fn fenced_block(body: &str) -> Option<&str> {
    let start = body.find("```")?;
    let after_fence = &body[start + 3..];
    let content_start = after_fence
        .strip_prefix("json")
        .unwrap_or(after_fence)
        .trim_start_matches(['\r', '\n']);
    let end = content_start.find("```")?;
    Some(content_start[..end].trim())
}

/// Substring from the first `{` to the last `}`.
fn brace_span(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Last-resort classification guess from free text.
fn keyword_scan(body: &str) -> Option<DocumentType> {
    let lowered = body.to_ascii_lowercase();
    if lowered.contains("sales quote") {
        Some(DocumentType::SalesQuote)
    } else if lowered.contains("proforma") {
        Some(DocumentType::ProformaInvoice)
    } else if lowered.contains("job shipment") || lowered.contains("job consumption") {
        Some(DocumentType::JobConsumption)
    } else {
        None
    }
}

fn preview(body: &str) -> String {
    const MAX: usize = 120;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let cut = trimmed
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        format!("{}…", &trimmed[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::Severity;

    const VERDICT: &str = r#"{"documentType":"SALES_QUOTE","classificationConfidence":0.9,"discrepancies":[{"field_name":"total","document_value":"5","erp_value":"6","severity":"high","description":"off by one"}]}"#;

    #[test]
    fn parses_bare_json() {
        let verdict = parse_verdict(VERDICT).unwrap();
        assert_eq!(verdict.document_type, DocumentType::SalesQuote);
        assert_eq!(verdict.discrepancies[0].severity, Severity::High);
    }

    #[test]
    fn parses_fenced_json() {
        let body = format!("Here is the result:\n```json\n{VERDICT}\n```\nDone.");
        let verdict = parse_verdict(&body).unwrap();
        assert_eq!(verdict.document_type, DocumentType::SalesQuote);
    }

    #[test]
    fn parses_bare_fence_without_language_tag() {
        let body = format!("```\n{VERDICT}\n```");
        let verdict = parse_verdict(&body).unwrap();
        assert_eq!(verdict.document_type, DocumentType::SalesQuote);
    }

    #[test]
    fn parses_brace_span_inside_prose() {
        let body = format!("The analysis concluded. {VERDICT} End of transmission.");
        let verdict = parse_verdict(&body).unwrap();
        assert_eq!(verdict.document_type, DocumentType::SalesQuote);
        assert_eq!(verdict.discrepancies.len(), 1);
    }

    #[test]
    fn keyword_scan_salvages_a_guess() {
        let verdict =
            parse_verdict("The document appears to be a Sales Quote from Contoso.").unwrap();
        assert_eq!(verdict.document_type, DocumentType::SalesQuote);
        assert_eq!(verdict.classification_confidence, 0.5);
        assert!(verdict.discrepancies.is_empty());
    }

    #[test]
    fn keyword_scan_knows_job_shipment() {
        let verdict = parse_verdict("Looks like a job shipment note").unwrap();
        assert_eq!(verdict.document_type, DocumentType::JobConsumption);
    }

    #[test]
    fn empty_and_garbage_fail() {
        assert!(matches!(
            parse_verdict("   "),
            Err(ResponseParseError::Empty)
        ));
        assert!(matches!(
            parse_verdict("no structure here at all"),
            Err(ResponseParseError::NoJson(_))
        ));
    }
}
