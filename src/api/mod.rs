//! HTTP adapter over the verification engine
//!
//! Thin axum handlers: intake creates a PENDING request and enqueues it; the
//! read endpoints expose the request rows; the eligibility probe consults the
//! ERP without creating state. The composition root in [`server`] wires the
//! whole service together.

pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use server::{router, run};
pub use state::AppState;
