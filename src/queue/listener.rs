//! Listener tasks draining the verification broker.
//!
//! Each listener decodes payloads and hands them to the orchestrator.
//! Decode failures dead-letter the message with its original bytes; nothing a
//! payload does may take the listener down.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::observability::Metrics;
use crate::state::{StateStore, VerificationRequest};
use crate::verify::Orchestrator;

use super::broker::Envelope;
use super::messages::{InboundCommand, VerifyJobMessage, parse_payload};
use super::store::QueueStore;

pub struct QueueListener {
    store: StateStore,
    queue: Arc<QueueStore>,
    orchestrator: Arc<Orchestrator>,
    metrics: Arc<Metrics>,
}

impl QueueListener {
    pub fn new(
        store: StateStore,
        queue: Arc<QueueStore>,
        orchestrator: Arc<Orchestrator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            queue,
            orchestrator,
            metrics,
        }
    }

    /// Spawn one listener task per broker receiver.
    pub fn spawn(
        listener: Arc<Self>,
        receivers: Vec<mpsc::Receiver<Envelope>>,
    ) -> Vec<JoinHandle<()>> {
        receivers
            .into_iter()
            .enumerate()
            .map(|(worker, mut receiver)| {
                let listener = listener.clone();
                tokio::spawn(async move {
                    info!(worker, "Verification listener started");
                    while let Some(envelope) = receiver.recv().await {
                        listener.handle(envelope).await;
                    }
                    info!(worker, "Verification listener stopped");
                })
            })
            .collect()
    }

    /// Process one envelope. Never panics, never rethrows into the runtime.
    pub async fn handle(&self, envelope: Envelope) {
        match parse_payload(&envelope.payload) {
            Ok(InboundCommand::Verify(message)) => self.verify(envelope.seq, message).await,
            Ok(InboundCommand::ManualTrigger { job_no }) => {
                self.manual_trigger(envelope.seq, job_no).await
            }
            Err(err) => {
                warn!(seq = envelope.seq, error = %err, "Undecodable payload");
                self.dead_letter(envelope.seq, &err.to_string());
            }
        }
    }

    async fn verify(&self, seq: u64, message: VerifyJobMessage) {
        let request_id = match Uuid::parse_str(message.verification_request_id.trim()) {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    seq,
                    raw_id = %message.verification_request_id,
                    error = %err,
                    "Payload carried a malformed request id"
                );
                self.dead_letter(seq, &format!("malformed verificationRequestId: {err}"));
                return;
            }
        };

        self.orchestrator.process(request_id, &message.job_no).await;
    }

    /// Legacy shorthand: a bare job number spawns a fresh PENDING request.
    async fn manual_trigger(&self, seq: u64, job_no: String) {
        info!(seq, job_no, "Manual trigger payload");
        let request = VerificationRequest::new(job_no.clone());
        if let Err(err) = self.store.create_request(&request) {
            error!(seq, job_no, error = %err, "Failed to create request for manual trigger");
            self.dead_letter(seq, &format!("manual trigger request creation failed: {err}"));
            return;
        }
        self.orchestrator.process(request.id, &job_no).await;
    }

    fn dead_letter(&self, seq: u64, reason: &str) {
        self.metrics.message_dead_lettered();
        if let Err(err) = self.queue.dead_letter(seq, reason) {
            error!(seq, error = %err, "Failed to dead-letter message");
        }
    }
}
