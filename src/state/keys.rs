/// Key layout for the state keyspace partitions
///
/// Partition structure:
/// - `jobs`: job:{business_central_job_id} -> Job (JSON)
/// - `requests`: req:{request_id} -> VerificationRequest (JSON)
/// - `requests_by_job`: reqjob:{job_no}:{request_id} -> request_id (string)
/// - `documents`: doc:{job_no}:{file_name} -> JobDocument (JSON)
/// - `activity`: act:{millis:016}:{event_id} -> ActivityEvent (JSON)
/// - `metadata`: meta:{name} -> value
use uuid::Uuid;

/// Encode a job key: job:{business_central_job_id}
pub fn job_key(job_no: &str) -> Vec<u8> {
    format!("job:{}", job_no).into_bytes()
}

/// Encode a request key: req:{request_id}
pub fn request_key(id: Uuid) -> Vec<u8> {
    format!("req:{}", id).into_bytes()
}

/// Encode a request index key: reqjob:{job_no}:{request_id}
///
/// Request ids are UUIDv7, so within one job's prefix the lexicographically
/// greatest key is the most recently created request.
pub fn request_index_key(job_no: &str, id: Uuid) -> Vec<u8> {
    format!("reqjob:{}:{}", job_no, id).into_bytes()
}

/// Encode the request index prefix for one job: reqjob:{job_no}:
pub fn request_index_prefix(job_no: &str) -> Vec<u8> {
    format!("reqjob:{}:", job_no).into_bytes()
}

/// Encode a document key: doc:{job_no}:{file_name}
///
/// The composite key is what enforces (job_no, file_name) uniqueness.
pub fn document_key(job_no: &str, file_name: &str) -> Vec<u8> {
    format!("doc:{}:{}", job_no, file_name).into_bytes()
}

/// Encode the document prefix for one job: doc:{job_no}:
pub fn document_prefix(job_no: &str) -> Vec<u8> {
    format!("doc:{}:", job_no).into_bytes()
}

/// Encode an activity key: act:{millis:016}:{event_id}
pub fn activity_key(timestamp_millis: i64, id: Uuid) -> Vec<u8> {
    format!("act:{:016}:{}", timestamp_millis.max(0), id).into_bytes()
}

/// Encode a metadata key: meta:{name}
pub fn meta_key(name: &str) -> Vec<u8> {
    format!("meta:{}", name).into_bytes()
}

/// Blob-store path for a document's bytes: documents/{job_no}/{file_name}
pub fn blob_path(job_no: &str, file_name: &str) -> String {
    format!("documents/{}/{}", job_no, file_name)
}
