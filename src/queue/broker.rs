use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::store::{QueueStore, Result};

/// A persisted payload on its way to a listener.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub seq: u64,
    pub payload: Bytes,
}

/// Distributes inbound verification payloads to the listener pool.
///
/// 1. Intake (HTTP adapter or manual trigger) calls `broker.enqueue(payload)`
/// 2. The payload is persisted to the queue store first (crash safety)
/// 3. An envelope goes to the next listener via round-robin mpsc channels
/// 4. Bounded channels provide back-pressure at the configured capacity
///
/// The broker is plain methods on a struct, not a task of its own.
pub struct VerifyBroker {
    store: Arc<QueueStore>,
    channels: Vec<mpsc::Sender<Envelope>>,
    next_worker: AtomicUsize,
}

impl VerifyBroker {
    /// Create a broker with `workers` listener channels.
    ///
    /// Returns the broker and one receiver per listener task.
    pub fn new(
        store: Arc<QueueStore>,
        workers: usize,
        channel_capacity: usize,
    ) -> (Self, Vec<mpsc::Receiver<Envelope>>) {
        info!(workers, channel_capacity, "Creating verification broker");

        let mut channels = Vec::with_capacity(workers);
        let mut receivers = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = mpsc::channel(channel_capacity);
            channels.push(tx);
            receivers.push(rx);
        }

        let broker = Self {
            store,
            channels,
            next_worker: AtomicUsize::new(0),
        };
        (broker, receivers)
    }

    /// Persist a payload and hand it to the next listener.
    ///
    /// The send may wait on a full channel; that wait is the back-pressure
    /// contract. A closed channel is not an error: the payload is already
    /// durable and can be re-driven.
    pub async fn enqueue(&self, payload: Vec<u8>) -> Result<u64> {
        let seq = self.store.enqueue(&payload)?;

        let envelope = Envelope {
            seq,
            payload: Bytes::from(payload),
        };

        let index = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        match self.channels[index].send(envelope).await {
            Ok(()) => debug!(seq, worker = index, "Payload dispatched"),
            Err(_) => warn!(seq, worker = index, "Listener channel closed, payload kept in store"),
        }

        Ok(seq)
    }

    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }

    /// All listener channels still open?
    pub fn health_check(&self) -> bool {
        self.channels.iter().all(|ch| !ch.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn enqueue_persists_then_dispatches() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(QueueStore::open(temp_dir.path()).unwrap());
        let (broker, mut receivers) = VerifyBroker::new(store.clone(), 2, 8);
        assert_eq!(broker.num_workers(), 2);

        let seq = broker.enqueue(b"payload-a".to_vec()).await.unwrap();
        assert_eq!(seq, 0);

        let envelope = receivers[0].recv().await.unwrap();
        assert_eq!(envelope.seq, 0);
        assert_eq!(&envelope.payload[..], b"payload-a");

        let seq = broker.enqueue(b"payload-b".to_vec()).await.unwrap();
        assert_eq!(seq, 1);
        let envelope = receivers[1].recv().await.unwrap();
        assert_eq!(&envelope.payload[..], b"payload-b");
    }

    #[tokio::test]
    async fn round_robin_across_listeners() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(QueueStore::open(temp_dir.path()).unwrap());
        let (broker, mut receivers) = VerifyBroker::new(store, 3, 8);

        for i in 0..6u8 {
            broker.enqueue(vec![i]).await.unwrap();
        }

        for (worker, receiver) in receivers.iter_mut().enumerate() {
            let first = receiver.recv().await.unwrap();
            let second = receiver.recv().await.unwrap();
            assert_eq!(first.seq as usize, worker);
            assert_eq!(second.seq as usize, worker + 3);
        }
    }

    #[tokio::test]
    async fn payload_survives_dead_listener() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(QueueStore::open(temp_dir.path()).unwrap());
        let (broker, receivers) = VerifyBroker::new(store.clone(), 1, 8);
        drop(receivers);

        let seq = broker.enqueue(b"kept".to_vec()).await.unwrap();
        assert_eq!(store.get(seq).unwrap().unwrap(), b"kept");
        assert!(!broker.health_check());
    }
}
