use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use object_store::ObjectStore;
use object_store::local::LocalFileSystem;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{Result, StoreError};
use super::keys;
use super::models::{ActivityEvent, Job, VerificationRequest};

const DOC_ID_COUNTER: &str = "next_document_id";

/// Fjall-backed persistent storage for jobs, verification requests, job
/// documents, and the activity log.
///
/// One partition per table-equivalent; records are serde JSON. Document blob
/// bytes live in an [`ObjectStore`] backend addressed by the same composite
/// key as the `documents` partition row.
#[derive(Clone)]
pub struct StateStore {
    keyspace: Keyspace,
    pub(super) jobs: PartitionHandle,
    pub(super) requests: PartitionHandle,
    pub(super) requests_by_job: PartitionHandle,
    pub(super) documents: PartitionHandle,
    pub(super) activity: PartitionHandle,
    pub(super) metadata: PartitionHandle,
    pub(super) blobs: Arc<dyn ObjectStore>,
    pub(super) doc_id_counter: Arc<AtomicU64>,
}

impl StateStore {
    /// Open or create a state store at the given path, with document blobs on
    /// the local filesystem next to it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let blob_dir = path.join("blobs");
        std::fs::create_dir_all(&blob_dir)?;
        let blobs: Arc<dyn ObjectStore> = Arc::new(LocalFileSystem::new_with_prefix(&blob_dir)?);
        Self::open_with_blobs(path, blobs)
    }

    /// Open or create a state store with an explicit blob backend
    /// (in-memory in tests).
    pub fn open_with_blobs<P: AsRef<Path>>(path: P, blobs: Arc<dyn ObjectStore>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening state store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let requests = keyspace.open_partition("requests", PartitionCreateOptions::default())?;
        let requests_by_job =
            keyspace.open_partition("requests_by_job", PartitionCreateOptions::default())?;
        let documents = keyspace.open_partition("documents", PartitionCreateOptions::default())?;
        let activity = keyspace.open_partition("activity", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        let next_doc_id = metadata
            .get(keys::meta_key(DOC_ID_COUNTER))?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        info!(next_doc_id, "State store opened");
        Ok(Self {
            keyspace,
            jobs,
            requests,
            requests_by_job,
            documents,
            activity,
            metadata,
            blobs,
            doc_id_counter: Arc::new(AtomicU64::new(next_doc_id)),
        })
    }

    // --- jobs ---------------------------------------------------------

    /// Store or update a job aggregate.
    pub fn upsert_job(&self, job: &Job) -> Result<()> {
        let key = keys::job_key(&job.business_central_job_id);
        let value = serde_json::to_vec(job)?;
        self.jobs.insert(key, value)?;
        debug!(job_no = %job.business_central_job_id, status = ?job.status, "Upserted job");
        Ok(())
    }

    /// Get a job by business-central job number.
    pub fn get_job(&self, job_no: &str) -> Result<Option<Job>> {
        match self.jobs.get(keys::job_key(job_no))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    // --- verification requests ----------------------------------------

    /// Insert a freshly created request and its job index entry.
    pub fn create_request(&self, request: &VerificationRequest) -> Result<()> {
        let value = serde_json::to_vec(request)?;
        let mut batch = self.keyspace.batch();
        batch.insert(&self.requests, keys::request_key(request.id), value);
        batch.insert(
            &self.requests_by_job,
            keys::request_index_key(&request.job_no, request.id),
            request.id.to_string().as_bytes(),
        );
        batch.commit()?;
        debug!(request_id = %request.id, job_no = %request.job_no, "Created verification request");
        Ok(())
    }

    /// Get a verification request by id.
    pub fn get_request(&self, id: Uuid) -> Result<Option<VerificationRequest>> {
        match self.requests.get(keys::request_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Latest verification request for a job, by creation order of the
    /// time-sortable request ids.
    pub fn latest_request_for_job(&self, job_no: &str) -> Result<Option<VerificationRequest>> {
        let prefix = keys::request_index_prefix(job_no);
        let Some(entry) = self.requests_by_job.prefix(prefix).next_back() else {
            return Ok(None);
        };
        let (_, value) = entry?;
        let id = Uuid::parse_str(&String::from_utf8_lossy(&value))
            .map_err(|e| StoreError::Serialization(serde::de::Error::custom(e)))?;
        self.get_request(id)
    }

    /// Atomically mark a request and its job aggregate in-flight. This is the
    /// one cross-partition write that must not tear.
    pub fn mark_processing(&self, request: &VerificationRequest, job: &Job) -> Result<()> {
        self.guard_transition(request)?;
        let mut batch = self.keyspace.batch();
        batch.insert(
            &self.requests,
            keys::request_key(request.id),
            serde_json::to_vec(request)?,
        );
        batch.insert(
            &self.jobs,
            keys::job_key(&job.business_central_job_id),
            serde_json::to_vec(job)?,
        );
        batch.commit()?;
        Ok(())
    }

    /// Write an updated request row, enforcing the status DAG: terminal rows
    /// are write-once and reject any further transition.
    pub fn update_request(&self, request: &VerificationRequest) -> Result<()> {
        self.guard_transition(request)?;
        let value = serde_json::to_vec(request)?;
        self.requests.insert(keys::request_key(request.id), value)?;
        Ok(())
    }

    /// Write a terminal request row and flush the keyspace so every earlier
    /// document/discrepancy write is durable before the terminal state is.
    pub fn finalize_request(&self, request: &VerificationRequest) -> Result<()> {
        debug_assert!(request.status.is_terminal());
        self.update_request(request)?;
        self.persist()?;
        Ok(())
    }

    fn guard_transition(&self, updated: &VerificationRequest) -> Result<()> {
        let Some(current) = self.get_request(updated.id)? else {
            return Err(StoreError::RequestNotFound(updated.id));
        };
        if current.status == updated.status || current.status.can_transition_to(updated.status) {
            Ok(())
        } else {
            Err(StoreError::IllegalTransition {
                id: updated.id,
                from: format!("{:?}", current.status),
                to: format!("{:?}", updated.status),
            })
        }
    }

    // --- activity log -------------------------------------------------

    /// Append an audit event.
    pub fn append_activity(&self, event: &ActivityEvent) -> Result<()> {
        let key = keys::activity_key(event.timestamp.timestamp_millis(), event.id);
        self.activity.insert(key, serde_json::to_vec(event)?)?;
        Ok(())
    }

    /// Most recent audit events, newest first.
    pub fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEvent>> {
        let mut events = Vec::with_capacity(limit);
        for entry in self.activity.iter().rev().take(limit) {
            let (_, value) = entry?;
            events.push(serde_json::from_slice(&value)?);
        }
        Ok(events)
    }

    // --- maintenance --------------------------------------------------

    /// Persist all pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Cheap accessibility probe for health checks.
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(keys::meta_key(DOC_ID_COUNTER))?;
        Ok(())
    }

    /// Row counts for monitoring.
    pub fn stats(&self) -> Result<StoreStats> {
        fn count(partition: &PartitionHandle) -> Result<usize> {
            let mut n = 0;
            for item in partition.iter() {
                item?;
                n += 1;
            }
            Ok(n)
        }

        Ok(StoreStats {
            job_count: count(&self.jobs)?,
            request_count: count(&self.requests)?,
            document_count: count(&self.documents)?,
            activity_count: count(&self.activity)?,
        })
    }

    pub(super) fn next_document_id(&self) -> Result<u64> {
        let id = self.doc_id_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.metadata
            .insert(keys::meta_key(DOC_ID_COUNTER), id.to_be_bytes())?;
        Ok(id)
    }
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub job_count: usize,
    pub request_count: usize,
    pub document_count: usize,
    pub activity_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::models::{JobStatus, RequestStatus};
    use tempfile::TempDir;

    fn create_test_store() -> (StateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let blobs: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());
        let store =
            StateStore::open_with_blobs(temp_dir.path().join("state"), blobs).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn upsert_and_get_job() {
        let (store, _temp) = create_test_store();
        let mut job = Job::new("J069026");
        job.job_title = "Pump overhaul".to_string();

        store.upsert_job(&job).unwrap();
        let loaded = store.get_job("J069026").unwrap().unwrap();
        assert_eq!(loaded.business_central_job_id, "J069026");
        assert_eq!(loaded.job_title, "Pump overhaul");
        assert_eq!(loaded.status, JobStatus::Pending);

        assert!(store.get_job("J000000").unwrap().is_none());
    }

    #[test]
    fn create_and_load_request() {
        let (store, _temp) = create_test_store();
        let request = VerificationRequest::new("J1");
        store.create_request(&request).unwrap();

        let loaded = store.get_request(request.id).unwrap().unwrap();
        assert_eq!(loaded.job_no, "J1");
        assert_eq!(loaded.status, RequestStatus::Pending);
        assert!(loaded.result_timestamp.is_none());
    }

    #[test]
    fn latest_request_picks_newest() {
        let (store, _temp) = create_test_store();
        let first = VerificationRequest::new("J1");
        // UUIDv7 ordering is millisecond-granular
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = VerificationRequest::new("J1");
        let other = VerificationRequest::new("J2");
        store.create_request(&first).unwrap();
        store.create_request(&second).unwrap();
        store.create_request(&other).unwrap();

        let latest = store.latest_request_for_job("J1").unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert!(store.latest_request_for_job("J9").unwrap().is_none());
    }

    #[test]
    fn terminal_status_is_write_once() {
        let (store, _temp) = create_test_store();
        let mut request = VerificationRequest::new("J1");
        store.create_request(&request).unwrap();

        request.status = RequestStatus::Processing;
        store.update_request(&request).unwrap();

        request.status = RequestStatus::Completed;
        request.result_timestamp = Some(chrono::Utc::now());
        store.finalize_request(&request).unwrap();

        request.status = RequestStatus::Failed;
        let err = store.update_request(&request).unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));

        let stored = store.get_request(request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Completed);
    }

    #[test]
    fn rejects_processing_to_pending() {
        let (store, _temp) = create_test_store();
        let mut request = VerificationRequest::new("J1");
        store.create_request(&request).unwrap();
        request.status = RequestStatus::Processing;
        store.update_request(&request).unwrap();

        request.status = RequestStatus::Pending;
        assert!(store.update_request(&request).is_err());
    }

    #[test]
    fn mark_processing_writes_both_rows() {
        let (store, _temp) = create_test_store();
        let mut request = VerificationRequest::new("J1");
        store.create_request(&request).unwrap();
        let mut job = Job::new("J1");

        request.status = RequestStatus::Processing;
        job.status = JobStatus::Processing;
        job.last_processed_at = Some(chrono::Utc::now());
        store.mark_processing(&request, &job).unwrap();

        assert_eq!(
            store.get_request(request.id).unwrap().unwrap().status,
            RequestStatus::Processing
        );
        assert_eq!(
            store.get_job("J1").unwrap().unwrap().status,
            JobStatus::Processing
        );
    }

    #[test]
    fn activity_is_append_only_and_ordered() {
        let (store, _temp) = create_test_store();
        store
            .append_activity(&ActivityEvent::new("VERIFICATION_STARTED", "first").for_job("J1"))
            .unwrap();
        store
            .append_activity(&ActivityEvent::new("VERIFICATION_COMPLETED", "second").for_job("J1"))
            .unwrap();

        let events = store.recent_activity(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].description, "second");
        assert_eq!(events[1].related_job_id.as_deref(), Some("J1"));

        let stats = store.stats().unwrap();
        assert_eq!(stats.activity_count, 2);
        assert_eq!(stats.job_count, 0);
    }

    #[test]
    fn counters_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state");
        let blobs: Arc<dyn ObjectStore> = Arc::new(object_store::memory::InMemory::new());

        let first_id = {
            let store = StateStore::open_with_blobs(&path, blobs.clone()).unwrap();
            store.next_document_id().unwrap()
        };
        let store = StateStore::open_with_blobs(&path, blobs).unwrap();
        let second_id = store.next_document_id().unwrap();
        assert!(second_id > first_id);
    }
}
