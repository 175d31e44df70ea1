//! Document rows and blob handling for the state store.
//!
//! A document's identity is the composite `(job_no, file_name)` key; the row
//! in the `documents` partition carries the scalar columns and the blob bytes
//! live in the object store under the matching path. Upserts are
//! read-modify-write merges so a re-uploaded file replaces the bytes without
//! ever clearing an earlier classification.

use bytes::Bytes;
use chrono::Utc;
use object_store::path::Path as BlobPath;
use tracing::debug;

use super::error::{Result, StoreError};
use super::keys;
use super::models::{JobDocument, UNCLASSIFIED};
use super::store::StateStore;

/// Input for a document upsert; everything the acquisition step knows.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub job_no: String,
    pub file_name: String,
    pub document_type: String,
    pub content_type: String,
    pub source_url: String,
    pub data: Bytes,
}

impl StateStore {
    /// Insert or replace the document stored under `(job_no, file_name)`.
    ///
    /// On replace: `document_type`, `content_type`, `source_url` and the blob
    /// bytes are overwritten; `id`, `created_at` and any existing
    /// `classified_document_type` are preserved.
    pub async fn upsert_document(&self, new: NewDocument) -> Result<JobDocument> {
        let key = keys::document_key(&new.job_no, &new.file_name);

        let document = match self.get_document(&new.job_no, &new.file_name)? {
            Some(existing) => JobDocument {
                document_type: new.document_type,
                content_type: new.content_type,
                source_url: new.source_url,
                size_bytes: new.data.len() as u64,
                ..existing
            },
            None => JobDocument {
                id: self.next_document_id()?,
                job_no: new.job_no.clone(),
                document_type: new.document_type,
                classified_document_type: None,
                file_name: new.file_name.clone(),
                content_type: new.content_type,
                size_bytes: new.data.len() as u64,
                source_url: new.source_url,
                created_at: Utc::now(),
            },
        };

        let blob_path = BlobPath::from(keys::blob_path(&new.job_no, &new.file_name));
        self.blobs.put(&blob_path, new.data.into()).await?;

        self.documents.insert(key, serde_json::to_vec(&document)?)?;
        debug!(
            job_no = %document.job_no,
            file_name = %document.file_name,
            id = document.id,
            size = document.size_bytes,
            "Upserted document"
        );
        Ok(document)
    }

    /// Get the document row stored under `(job_no, file_name)`.
    pub fn get_document(&self, job_no: &str, file_name: &str) -> Result<Option<JobDocument>> {
        match self.documents.get(keys::document_key(job_no, file_name))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// All document rows for a job, in file-name order.
    pub fn documents_for_job(&self, job_no: &str) -> Result<Vec<JobDocument>> {
        let mut documents = Vec::new();
        for entry in self.documents.prefix(keys::document_prefix(job_no)) {
            let (_, value) = entry?;
            documents.push(serde_json::from_slice(&value)?);
        }
        Ok(documents)
    }

    /// Record a classification outcome. A value is only written when the row
    /// has no classification yet (null or the `UNCLASSIFIED` placeholder);
    /// an established classification is never overwritten or cleared.
    pub fn set_classified_type(
        &self,
        job_no: &str,
        file_name: &str,
        classified: &str,
    ) -> Result<bool> {
        let Some(mut document) = self.get_document(job_no, file_name)? else {
            return Err(StoreError::DocumentNotFound(
                job_no.to_string(),
                file_name.to_string(),
            ));
        };

        let unset = match document.classified_document_type.as_deref() {
            None => true,
            Some(current) => current.trim().is_empty() || current == UNCLASSIFIED,
        };
        if !unset || classified.trim().is_empty() {
            return Ok(false);
        }

        document.classified_document_type = Some(classified.to_string());
        self.documents.insert(
            keys::document_key(job_no, file_name),
            serde_json::to_vec(&document)?,
        )?;
        Ok(true)
    }

    /// Highest-id document whose `document_type` or `classified_document_type`
    /// matches, with both inputs trimmed before comparison.
    pub fn latest_document_by_type(
        &self,
        job_no: &str,
        document_type: &str,
    ) -> Result<Option<JobDocument>> {
        let job_no = job_no.trim();
        let wanted = document_type.trim();

        let mut best: Option<JobDocument> = None;
        for document in self.documents_for_job(job_no)? {
            let matches = document.document_type == wanted
                || document.classified_document_type.as_deref() == Some(wanted);
            if matches && best.as_ref().is_none_or(|b| document.id > b.id) {
                best = Some(document);
            }
        }
        Ok(best)
    }

    /// Blob bytes for a stored document.
    pub async fn document_data(&self, job_no: &str, file_name: &str) -> Result<Bytes> {
        let path = BlobPath::from(keys::blob_path(job_no, file_name));
        let result = self.blobs.get(&path).await?;
        Ok(result.bytes().await?)
    }
}
