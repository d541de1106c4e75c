//! NATS bus wrapper. Publishes JSON payloads; delivery is at-least-once
//! from the consumer's point of view since cycles can be retried.

use std::time::Duration;

use anyhow::{Context, Result};
use async_nats::ConnectOptions;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::traits::EventBus;

const PING_INTERVAL: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connect with fast failure: if NATS is down at boot we want the
    /// process to exit rather than start workers with nowhere to publish.
    /// Reconnection after an initial successful connect is automatic.
    pub async fn connect(url: &str) -> Result<Self> {
        info!(url, "Connecting to NATS");
        let client = ConnectOptions::new()
            .name("vigil")
            .ping_interval(PING_INTERVAL)
            .connection_timeout(CONNECT_TIMEOUT)
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to NATS at {url}"))?;
        info!(url, "Connected to NATS");
        Ok(Self { client })
    }
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, subject: &str, payload: serde_json::Value) -> Result<()> {
        let bytes = Bytes::from(serde_json::to_vec(&payload)?);
        self.client
            .publish(subject.to_string(), bytes)
            .await
            .with_context(|| format!("publish to {subject} failed"))?;
        Ok(())
    }
}
