//! Top-level worker manager: one task per domain, restarted on failure.
//!
//! A worker only returns when the state store (or bus) is failing. Because
//! the known set and seed flags are durable, a restarted worker resumes
//! from persisted state: no in-memory handoff, no partial cycles.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use vigil_common::subjects;
use vigil_common::types::Domain;

use crate::traits::EventBus;
use crate::worker::DomainWorker;

pub struct WorkerManager {
    bus: Arc<dyn EventBus>,
    restart_delay: Duration,
}

impl WorkerManager {
    pub fn new(bus: Arc<dyn EventBus>, restart_delay: Duration) -> Self {
        Self { bus, restart_delay }
    }

    /// Spawn a supervised worker for one domain. `build` is called once per
    /// (re)start so each incarnation gets fresh backoff state.
    pub fn spawn(
        &self,
        domain: Domain,
        build: impl Fn() -> DomainWorker + Send + 'static,
    ) -> JoinHandle<()> {
        let bus = self.bus.clone();
        let restart_delay = self.restart_delay;

        tokio::spawn(async move {
            loop {
                let worker = build();
                match worker.run().await {
                    Ok(()) => error!(%domain, "Worker loop exited unexpectedly; restarting"),
                    Err(e) => error!(%domain, error = %e, "Worker crashed; restarting"),
                }

                let note = json!({
                    "kind": "worker_restart",
                    "domain": domain.as_str(),
                    "message": format!("{domain}: worker restarting in {}s", restart_delay.as_secs()),
                });
                if let Err(e) = bus.publish(subjects::SYSTEM_HEALTH, note).await {
                    warn!(%domain, error = %e, "Failed to publish restart note");
                }

                tokio::time::sleep(restart_delay).await;
            }
        })
    }
}
