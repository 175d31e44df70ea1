//! Verification orchestration engine
//!
//! One state machine per verification request: eligibility → reference-data
//! fetch → document acquisition → per-document classify+verify → aggregation
//! → optional ERP write-back → terminal commit. The orchestrator talks to the
//! outside world only through the `ErpApi`, `DocumentVerifier`, and
//! `PageRenderer` seams, so every path is drivable in tests.

pub mod discrepancy;
pub mod documents;
pub mod eligibility;
pub mod orchestrator;

pub use discrepancy::{Finding, Outcome};
pub use eligibility::{Eligibility, SKIP_DISCREPANCY, evaluate};
pub use orchestrator::Orchestrator;
