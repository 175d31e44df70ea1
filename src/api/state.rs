use std::sync::Arc;

use crate::config::Config;
use crate::erp::ErpApi;
use crate::observability::Metrics;
use crate::queue::{QueueStore, VerifyBroker};
use crate::state::StateStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: StateStore,
    pub queue: Arc<QueueStore>,
    pub broker: Arc<VerifyBroker>,
    pub erp: Arc<dyn ErpApi>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: StateStore,
        queue: Arc<QueueStore>,
        broker: Arc<VerifyBroker>,
        erp: Arc<dyn ErpApi>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            queue,
            broker,
            erp,
            metrics,
        }
    }
}
