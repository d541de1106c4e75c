//! Per-domain poll worker.
//!
//! One cycle at a time: acquire a token, fetch a full snapshot, reconcile
//! it against the known set, then sleep until the next cycle. The sleep is
//! self-rescheduling: the next cycle starts a fixed delay after the
//! current one *completes*, so cycles never overlap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info, warn};

use vigil_common::error::FetchError;
use vigil_common::types::{ChangeAction, Domain, DownloadRequest, EventKind, HealthNote, TrackedItem};
use vigil_common::{subjects, Config};

use crate::backoff::Backoff;
use crate::diff::{anomaly_threshold, compute_diff, confirmed, Diff};
use crate::traits::{EventBus, SnapshotFetcher, StateStore, TokenProvider};

/// Per-worker knobs, passed in explicitly so tests can supply
/// deterministic values instead of reading globals.
#[derive(Debug, Clone)]
pub struct WatchTuning {
    pub poll_interval: Duration,
    pub anomaly_floor: usize,
    pub anomaly_ratio: f64,
    pub backoff_initial: Duration,
    pub backoff_max: Duration,
}

impl WatchTuning {
    pub fn for_domain(config: &Config, domain: Domain) -> Self {
        let poll_interval = match domain {
            Domain::LikedVideos => config.likes_poll_interval,
            Domain::Subscriptions => config.subscriptions_poll_interval,
            Domain::WatchHistory => config.watch_poll_interval,
        };
        Self {
            poll_interval,
            anomaly_floor: config.anomaly_floor,
            anomaly_ratio: config.anomaly_ratio,
            backoff_initial: config.backoff_initial,
            backoff_max: config.backoff_max,
        }
    }
}

/// What one cycle did. Returned for observability and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First successful cycle: known set recorded silently.
    Seeded { count: usize },
    /// Snapshot matched the known set exactly.
    NoChange,
    /// Accepted changes were persisted and published.
    Applied { added: usize, removed: usize },
    /// Oversized diff failed confirmation; nothing was touched.
    AnomalySkipped,
    /// Quota hit; next cycle delayed by the returned backoff.
    QuotaBackoff,
    /// Credential unavailable or rejected; retry at the normal interval.
    AuthFailed,
    /// Transient or partial fetch failure; retry at the normal interval.
    FetchFailed,
}

pub struct DomainWorker {
    domain: Domain,
    tuning: WatchTuning,
    store: Arc<dyn StateStore>,
    fetcher: Arc<dyn SnapshotFetcher>,
    tokens: Arc<dyn TokenProvider>,
    bus: Arc<dyn EventBus>,
    backoff: Backoff,
}

impl DomainWorker {
    pub fn new(
        domain: Domain,
        tuning: WatchTuning,
        store: Arc<dyn StateStore>,
        fetcher: Arc<dyn SnapshotFetcher>,
        tokens: Arc<dyn TokenProvider>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let backoff = Backoff::new(tuning.backoff_initial, tuning.backoff_max);
        Self {
            domain,
            tuning,
            store,
            fetcher,
            tokens,
            bus,
            backoff,
        }
    }

    /// Poll forever. Returns only on a store failure, at which point the
    /// manager restarts the worker; the durable known set makes that safe.
    pub async fn run(mut self) -> Result<()> {
        info!(domain = %self.domain, interval_secs = self.tuning.poll_interval.as_secs(), "Worker started");
        loop {
            let (outcome, delay) = self.run_cycle().await?;
            debug!(domain = %self.domain, ?outcome, next_in_secs = delay.as_secs(), "Cycle complete");
            tokio::time::sleep(delay).await;
        }
    }

    /// One full poll cycle. `Err` means the state store or bus is failing;
    /// everything upstream-related is contained and mapped to an outcome.
    pub async fn run_cycle(&mut self) -> Result<(CycleOutcome, Duration)> {
        let normal = self.tuning.poll_interval;

        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(domain = %self.domain, error = %e, "Could not acquire access token");
                self.health("auth", format!("{}: token acquisition failed: {e}", self.domain))
                    .await;
                return Ok((CycleOutcome::AuthFailed, normal));
            }
        };

        match self.fetcher.fetch(&token).await {
            Ok(snapshot) => {
                if self.backoff.on_success() {
                    info!(domain = %self.domain, "Quota recovered, resuming normal polling");
                    self.health("recovery", format!("{}: quota recovered", self.domain))
                        .await;
                }
                let outcome = self.reconcile(&token, snapshot).await?;
                Ok((outcome, normal))
            }
            Err(FetchError::QuotaExceeded) => {
                let step = self.backoff.on_quota();
                warn!(
                    domain = %self.domain,
                    delay_secs = step.delay.as_secs(),
                    "Quota exceeded, backing off"
                );
                if step.alert {
                    self.health(
                        "backoff",
                        format!(
                            "{}: upstream quota exceeded, polling suspended for {} min (doubles up to {} min until recovery)",
                            self.domain,
                            step.delay.as_secs() / 60,
                            self.tuning.backoff_max.as_secs() / 60,
                        ),
                    )
                    .await;
                }
                Ok((CycleOutcome::QuotaBackoff, step.delay))
            }
            Err(FetchError::Auth(msg)) => {
                warn!(domain = %self.domain, error = %msg, "Upstream rejected credentials");
                self.health("auth", format!("{}: upstream auth failure: {msg}", self.domain))
                    .await;
                Ok((CycleOutcome::AuthFailed, normal))
            }
            Err(e @ FetchError::Partial { .. }) => {
                // The accumulated pages were discarded by the fetcher; diffing
                // them would have fabricated removals for every unfetched item.
                warn!(domain = %self.domain, error = %e, "Discarding partial snapshot");
                Ok((CycleOutcome::FetchFailed, normal))
            }
            Err(FetchError::Transient(msg)) => {
                warn!(domain = %self.domain, error = %msg, "Fetch failed");
                Ok((CycleOutcome::FetchFailed, normal))
            }
        }
    }

    /// Diff a successful snapshot against the known set and commit whatever
    /// is accepted. The known set is only ever mutated from here.
    async fn reconcile(
        &self,
        token: &str,
        snapshot: Vec<TrackedItem>,
    ) -> Result<CycleOutcome> {
        if !self.store.is_seeded(self.domain).await? {
            return self.seed(snapshot).await;
        }

        let known = self.store.known_items(self.domain).await?;
        let diff = compute_diff(&known, &snapshot, self.domain.tracks_removals());
        if diff.is_empty() {
            return Ok(CycleOutcome::NoChange);
        }

        let threshold = anomaly_threshold(known.len(), self.tuning.anomaly_floor, self.tuning.anomaly_ratio);
        if diff.size() <= threshold {
            return self.apply(&diff).await;
        }

        // Oversized diff: could be genuine bulk activity, could be an
        // upstream pagination hiccup that slipped past the fetch contract.
        // Re-fetch independently and trust only what both diffs agree on.
        info!(
            domain = %self.domain,
            added = diff.added.len(),
            removed = diff.removed.len(),
            threshold,
            "Diff exceeds anomaly threshold, confirming with a second fetch"
        );

        let second_snapshot = match self.fetcher.fetch(token).await {
            Ok(s) => s,
            Err(e) => {
                // Unconfirmed is untrusted: leave the known set alone and let
                // the next cycle re-evaluate from scratch.
                warn!(domain = %self.domain, error = %e, "Confirmation fetch failed, skipping cycle");
                return Ok(CycleOutcome::AnomalySkipped);
            }
        };
        let second = compute_diff(&known, &second_snapshot, self.domain.tracks_removals());
        let agreed = confirmed(&diff, &second);

        if agreed.is_empty() {
            warn!(domain = %self.domain, "Anomalous diff not confirmed, skipping cycle");
            self.health(
                "anomaly",
                format!(
                    "{}: suspicious diff (first fetch +{}/-{}, confirmation +{}/-{}, threshold {}); nothing confirmed, cycle skipped",
                    self.domain,
                    diff.added.len(),
                    diff.removed.len(),
                    second.added.len(),
                    second.removed.len(),
                    threshold,
                ),
            )
            .await;
            return Ok(CycleOutcome::AnomalySkipped);
        }

        let dropped = diff.size() - agreed.size();
        if dropped > 0 {
            info!(
                domain = %self.domain,
                confirmed = agreed.size(),
                dropped,
                "Processing confirmed subset; unconfirmed ids re-evaluated next cycle"
            );
        }
        self.apply(&agreed).await
    }

    /// First-cycle bootstrap: record everything silently. One summary event,
    /// no per-item notifications, no download requests. The user already
    /// knows about their own pre-existing likes.
    async fn seed(&self, snapshot: Vec<TrackedItem>) -> Result<CycleOutcome> {
        let count = snapshot.len();
        for item in &snapshot {
            self.store.upsert_known(self.domain, item).await?;
        }
        self.store.mark_seeded(self.domain).await?;
        self.store
            .append_event(
                self.domain,
                EventKind::SeedSummary,
                None,
                json!({ "count": count }),
            )
            .await?;
        info!(domain = %self.domain, count, "Seeded known set");
        self.health("seed", format!("{}: seeded with {count} items", self.domain))
            .await;
        Ok(CycleOutcome::Seeded { count })
    }

    /// Commit an accepted diff, item by item. Each item is independent:
    /// persist first, then publish, so a crash mid-apply leaves no
    /// published-but-unpersisted change. Re-running is idempotent.
    async fn apply(&self, diff: &Diff) -> Result<CycleOutcome> {
        for item in &diff.added {
            self.store.upsert_known(self.domain, item).await?;
            let payload = change_payload(self.domain, item, ChangeAction::Added);
            self.store
                .append_event(self.domain, EventKind::Add, Some(&item.id), payload.clone())
                .await?;
            self.bus.publish(subjects::changed(self.domain), payload).await?;
            if self.domain.emits_download_request() {
                let request = DownloadRequest::for_item(item);
                self.bus
                    .publish(subjects::DOWNLOAD_REQUEST, serde_json::to_value(&request)?)
                    .await?;
            }
            info!(domain = %self.domain, id = %item.id, title = %item.title, "Added");
        }

        for item in &diff.removed {
            self.store.remove_known(self.domain, &item.id).await?;
            let payload = change_payload(self.domain, item, ChangeAction::Removed);
            self.store
                .append_event(self.domain, EventKind::Remove, Some(&item.id), payload.clone())
                .await?;
            self.bus.publish(subjects::changed(self.domain), payload).await?;
            info!(domain = %self.domain, id = %item.id, title = %item.title, "Removed");
        }

        Ok(CycleOutcome::Applied {
            added: diff.added.len(),
            removed: diff.removed.len(),
        })
    }

    /// Best-effort operator note. A dead health channel shouldn't take the
    /// reconciliation loop down with it.
    async fn health(&self, kind: &str, message: String) {
        let note = HealthNote::new(kind, Some(self.domain), message);
        match serde_json::to_value(&note) {
            Ok(payload) => {
                if let Err(e) = self.bus.publish(subjects::SYSTEM_HEALTH, payload).await {
                    warn!(domain = %self.domain, error = %e, "Failed to publish health note");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize health note"),
        }
    }
}

/// The `<domain>.changed` payload. Field names match what the notification
/// formatter and the gateway's events table expect.
fn change_payload(domain: Domain, item: &TrackedItem, action: ChangeAction) -> serde_json::Value {
    let mut payload = json!({
        domain.id_field(): item.id,
        "title": item.title,
        "action": domain.action_label(action),
        "url": item.url(domain),
    });
    let map = payload.as_object_mut().expect("payload is an object");
    if let Some(channel_id) = &item.channel_id {
        map.insert("channel_id".into(), json!(channel_id));
    }
    if let Some(channel_title) = &item.channel_title {
        map.insert("channel_title".into(), json!(channel_title));
    }
    if let Some(duration) = item.duration_seconds {
        map.insert("duration_seconds".into(), json!(duration));
    }
    if let Some(thumbnail) = &item.thumbnail {
        map.insert("thumbnail".into(), json!(thumbnail));
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_payload_keys_subscriptions_by_channel() {
        let item = TrackedItem {
            id: "UC42".into(),
            title: "A channel".into(),
            channel_id: Some("UC42".into()),
            channel_title: None,
            duration_seconds: None,
            thumbnail: None,
        };
        let payload = change_payload(Domain::Subscriptions, &item, ChangeAction::Removed);
        assert_eq!(payload["channel_id"], "UC42");
        assert_eq!(payload["action"], "unsubscribed");
        assert!(payload.get("video_id").is_none());
    }

    #[test]
    fn change_payload_carries_display_fields() {
        let item = TrackedItem {
            id: "abc".into(),
            title: "A video".into(),
            channel_id: Some("UC1".into()),
            channel_title: Some("Someone".into()),
            duration_seconds: Some(225),
            thumbnail: Some("https://i.ytimg.com/x.jpg".into()),
        };
        let payload = change_payload(Domain::LikedVideos, &item, ChangeAction::Added);
        assert_eq!(payload["video_id"], "abc");
        assert_eq!(payload["action"], "liked");
        assert_eq!(payload["duration_seconds"], 225);
        assert_eq!(payload["url"], "https://youtube.com/watch?v=abc");
    }
}
