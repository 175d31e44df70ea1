//! Business Central (OData) client: reference-data reads, attachment
//! downloads, and the concurrency-token write-back of second-check fields.

pub mod client;
pub mod error;
pub mod models;
mod writeback;

pub use client::{ErpApi, ErpClient};
pub use error::{ErpError, Result, WriteBackError};
pub use models::{
    DownloadedDocument, JobAttachmentLinks, JobLedgerEntry, JobListEntry, ODataCollection,
    ReferenceBundles, SalesInvoiceHeader, SalesQuote, SalesQuoteHeader, SalesQuoteLine,
    VerificationFields,
};
