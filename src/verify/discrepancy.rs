//! Discrepancy lifting and aggregation.
//!
//! Model discrepancies become human-readable strings on the verification
//! request. High/medium severities flag the verification; low severities are
//! carried as advisories and never flip the outcome on their own. Operational
//! gaps (unavailable models, failed downloads, missing reference bundles) are
//! lifted here too, so the request row tells the whole story.

use std::fmt;

use crate::llm::LlmVerdict;

const ADVISORY_PREFIX: &str = "[advisory]";

/// Final verdict over a request's aggregated findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Flagged,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("PASS"),
            Outcome::Flagged => f.write_str("FLAGGED"),
        }
    }
}

/// One lifted discrepancy string plus whether it is advisory-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub text: String,
    pub advisory: bool,
}

impl Finding {
    /// A finding that flags the verification.
    pub fn flagging(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            advisory: false,
        }
    }

    /// An advisory note carried on the request without flagging it.
    pub fn advisory(text: impl Into<String>) -> Self {
        Self {
            text: format!("{ADVISORY_PREFIX} {}", text.into()),
            advisory: true,
        }
    }
}

/// Translate one document verdict into findings.
pub fn lift_verdict(file_name: &str, verdict: &LlmVerdict) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(error) = &verdict.error {
        findings.push(Finding::flagging(format!(
            "LLM unavailable for document {file_name}: {error}"
        )));
        return findings;
    }

    for discrepancy in &verdict.discrepancies {
        let text = format!(
            "{}: doc={} erp={} ({})",
            discrepancy.field_name,
            discrepancy.document_value,
            discrepancy.erp_value,
            discrepancy.description
        );
        if discrepancy.severity.is_advisory() {
            findings.push(Finding::advisory(text));
        } else {
            findings.push(Finding::flagging(text));
        }
    }

    findings
}

/// PASS iff nothing non-advisory was found.
pub fn outcome(findings: &[Finding]) -> Outcome {
    if findings.iter().any(|f| !f.advisory) {
        Outcome::Flagged
    } else {
        Outcome::Pass
    }
}

/// Serialize findings for the request row: `None` for a clean pass.
pub fn to_discrepancy_list(findings: &[Finding]) -> Option<Vec<String>> {
    if findings.is_empty() {
        None
    } else {
        Some(findings.iter().map(|f| f.text.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmDiscrepancy, Severity};

    fn discrepancy(severity: Severity) -> LlmDiscrepancy {
        LlmDiscrepancy {
            field_name: "total_amount".to_string(),
            document_value: "1100.00".to_string(),
            erp_value: "1000.00".to_string(),
            severity,
            description: "totals differ".to_string(),
        }
    }

    #[test]
    fn high_severity_lifts_to_flagging_text() {
        let verdict = LlmVerdict {
            discrepancies: vec![discrepancy(Severity::High)],
            ..LlmVerdict::default()
        };
        let findings = lift_verdict("quote.pdf", &verdict);
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].advisory);
        assert_eq!(
            findings[0].text,
            "total_amount: doc=1100.00 erp=1000.00 (totals differ)"
        );
    }

    #[test]
    fn low_severity_is_advisory_and_prefixed() {
        let verdict = LlmVerdict {
            discrepancies: vec![discrepancy(Severity::Low)],
            ..LlmVerdict::default()
        };
        let findings = lift_verdict("quote.pdf", &verdict);
        assert!(findings[0].advisory);
        assert!(findings[0].text.starts_with("[advisory] total_amount:"));
    }

    #[test]
    fn exhaustion_becomes_an_llm_unavailable_finding() {
        let verdict = LlmVerdict::unavailable("all models failed");
        let findings = lift_verdict("quote.pdf", &verdict);
        assert_eq!(findings.len(), 1);
        assert!(!findings[0].advisory);
        assert!(findings[0].text.contains("LLM unavailable"));
        assert!(findings[0].text.contains("quote.pdf"));
    }

    #[test]
    fn advisories_alone_still_pass() {
        let advisories = vec![Finding::advisory("minor date format mismatch")];
        assert_eq!(outcome(&advisories), Outcome::Pass);

        let mixed = vec![
            Finding::advisory("minor"),
            Finding::flagging("totals differ"),
        ];
        assert_eq!(outcome(&mixed), Outcome::Flagged);

        assert_eq!(outcome(&[]), Outcome::Pass);
    }

    #[test]
    fn clean_pass_serializes_to_none() {
        assert!(to_discrepancy_list(&[]).is_none());
        let findings = vec![Finding::flagging("totals differ")];
        assert_eq!(
            to_discrepancy_list(&findings).unwrap(),
            vec!["totals differ".to_string()]
        );
    }
}
