//! Multimodal verification-service client: classify+verify requests, ordered
//! model fallback, and tolerant response parsing.

pub mod client;
pub mod models;
pub mod parse;

pub use client::{DocumentVerifier, LlmClient};
pub use models::{
    DocumentType, FieldConfidence, GenerationParams, LlmDiscrepancy, LlmVerdict, Severity,
};
pub use parse::{ResponseParseError, parse_verdict};
