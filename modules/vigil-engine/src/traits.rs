// Trait abstractions at the worker's I/O seams.
//
// StateStore: the durable known set, seed flags, and event log.
// SnapshotFetcher: one complete upstream snapshot or an explicit error.
// TokenProvider: a usable credential or an explicit error, no retries inside.
// EventBus: at-least-once publish to NATS subjects.
//
// These enable deterministic testing with the mocks in `testing`:
// no network, no database, no Docker.

use anyhow::Result;
use async_trait::async_trait;

use vigil_common::error::FetchError;
use vigil_common::types::{Domain, EventKind, TrackedItem};
use vigil_store::PgStateStore;

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StateStore: Send + Sync {
    /// The confirmed known set for a domain.
    async fn known_items(&self, domain: Domain) -> Result<Vec<TrackedItem>>;

    /// Insert or refresh one confirmed item. Idempotent.
    async fn upsert_known(&self, domain: Domain, item: &TrackedItem) -> Result<()>;

    /// Delete one confirmed item. Removing an absent id is a no-op.
    async fn remove_known(&self, domain: Domain, item_id: &str) -> Result<()>;

    async fn is_seeded(&self, domain: Domain) -> Result<bool>;

    async fn mark_seeded(&self, domain: Domain) -> Result<()>;

    /// Append one write-once event log row.
    async fn append_event(
        &self,
        domain: Domain,
        kind: EventKind,
        item_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<i64>;
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn known_items(&self, domain: Domain) -> Result<Vec<TrackedItem>> {
        PgStateStore::known_items(self, domain).await
    }

    async fn upsert_known(&self, domain: Domain, item: &TrackedItem) -> Result<()> {
        PgStateStore::upsert_known(self, domain, item).await
    }

    async fn remove_known(&self, domain: Domain, item_id: &str) -> Result<()> {
        PgStateStore::remove_known(self, domain, item_id).await
    }

    async fn is_seeded(&self, domain: Domain) -> Result<bool> {
        PgStateStore::is_seeded(self, domain).await
    }

    async fn mark_seeded(&self, domain: Domain) -> Result<()> {
        PgStateStore::mark_seeded(self, domain).await
    }

    async fn append_event(
        &self,
        domain: Domain,
        kind: EventKind,
        item_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<i64> {
        PgStateStore::append_event(self, domain, kind, item_id, payload).await
    }
}

// ---------------------------------------------------------------------------
// SnapshotFetcher
// ---------------------------------------------------------------------------

/// Returns the upstream's *complete* current state for one domain.
///
/// Hard contract: never return an accumulated partial page list as `Ok`.
/// A partial snapshot fed to the diff makes every unfetched item look
/// removed; this was the root cause of false unsubscribe spam.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch(&self, token: &str) -> std::result::Result<Vec<TrackedItem>, FetchError>;
}

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

/// Yields a usable access token or an explicit error. No implicit retries;
/// the worker retries at its normal interval.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// At-least-once publish. Consumers must be idempotent: the event log and
/// the bus may both carry duplicates across retries.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, subject: &str, payload: serde_json::Value) -> Result<()>;
}
