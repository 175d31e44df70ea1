//! Second-check eligibility rules over the ERP job-list entry.
//!
//! A job qualifies when the first check has been recorded and nobody has
//! performed the second check yet.

use crate::erp::JobListEntry;

/// Discrepancy string recorded on requests skipped for ineligibility.
pub const SKIP_DISCREPANCY: &str = "Job does not qualify for second check.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub eligible: bool,
    pub reason: String,
}

impl Eligibility {
    fn no(reason: String) -> Self {
        Self {
            eligible: false,
            reason,
        }
    }
}

/// Evaluate eligibility from the job-list entry's check bookkeeping fields.
pub fn evaluate(entry: &JobListEntry) -> Eligibility {
    if entry.first_check_date.trim().is_empty() {
        return Eligibility::no("First check has not been completed.".to_string());
    }

    let second_check_by = entry.second_check_by.trim();
    if !second_check_by.is_empty() {
        return Eligibility::no(format!(
            "Job has already been second-checked by {}.",
            second_check_by
        ));
    }

    Eligibility {
        eligible: true,
        reason: "Job qualifies for second check.".to_string(),
    }
}
