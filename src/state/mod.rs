//! Embedded persistence for verification state
//!
//! Fjall (an embedded LSM key-value store) holds one partition per
//! table-equivalent:
//!
//! - Jobs (aggregate status per business-central job number)
//! - Verification requests (one row per invocation, terminal rows write-once)
//! - A job → requests index (UUIDv7 keys, so newest sorts last)
//! - Job documents (composite `(job_no, file_name)` key enforces uniqueness)
//! - Activity log (append-only audit events)
//! - Metadata (persistent counters)
//!
//! Document blob bytes live in an `object_store` backend next to the keyspace
//! (local filesystem in production, in-memory in tests).
//!
//! The only cross-partition write that must be atomic is the initial
//! "mark PROCESSING" of a request and its job; it uses a fjall write batch.
//! Terminal request writes flush the keyspace so everything they summarize is
//! durable first.

mod documents;
pub mod error;
mod keys;
mod models;
mod store;

pub use documents::NewDocument;
pub use error::{Result, StoreError};
pub use models::{
    ActivityEvent, Job, JobDocument, JobStatus, RequestStatus, UNCLASSIFIED, VerificationRequest,
};
pub use store::{StateStore, StoreStats};
