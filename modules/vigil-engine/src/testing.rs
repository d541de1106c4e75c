// Test mocks for the reconciliation engine, one per trait seam:
// - MemoryStore (StateStore): stateful in-memory known set + event log
// - ScriptedFetcher (SnapshotFetcher): fixed sequence of fetch results
// - StaticTokens / FailingTokens (TokenProvider)
// - RecordingBus (EventBus): captures published subjects and payloads
//
// Plus helpers for constructing TrackedItems.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use vigil_common::error::FetchError;
use vigil_common::types::{Domain, EventKind, TrackedItem};

use crate::traits::{EventBus, SnapshotFetcher, StateStore, TokenProvider};

// ---------------------------------------------------------------------------
// Item helpers
// ---------------------------------------------------------------------------

pub fn item(id: &str) -> TrackedItem {
    TrackedItem {
        id: id.to_string(),
        title: format!("title {id}"),
        channel_id: Some(format!("UC-{id}")),
        channel_title: Some(format!("channel {id}")),
        duration_seconds: Some(120),
        thumbnail: None,
    }
}

pub fn items(ids: &[&str]) -> Vec<TrackedItem> {
    ids.iter().map(|id| item(id)).collect()
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub domain: Domain,
    pub event_type: String,
    pub item_id: Option<String>,
    pub payload: serde_json::Value,
}

#[derive(Default)]
struct MemoryInner {
    known: HashMap<Domain, HashMap<String, TrackedItem>>,
    seeded: HashSet<Domain>,
    events: Vec<RecordedEvent>,
}

/// In-memory StateStore. Interior mutability so tests can share it with
/// the worker through an Arc and then assert on the final state.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a seeded domain, as if a bootstrap had already run.
    pub fn seeded_with(domain: Domain, items: Vec<TrackedItem>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap();
            let map = inner.known.entry(domain).or_default();
            for item in items {
                map.insert(item.id.clone(), item);
            }
            inner.seeded.insert(domain);
        }
        store
    }

    /// Known ids for a domain, sorted for stable assertions.
    pub fn known_ids(&self, domain: Domain) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner
            .known
            .get(&domain)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn events_for(&self, domain: Domain) -> Vec<RecordedEvent> {
        let inner = self.inner.lock().unwrap();
        inner
            .events
            .iter()
            .filter(|e| e.domain == domain)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn known_items(&self, domain: Domain) -> Result<Vec<TrackedItem>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<TrackedItem> = inner
            .known
            .get(&domain)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn upsert_known(&self, domain: Domain, item: &TrackedItem) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .known
            .entry(domain)
            .or_default()
            .insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn remove_known(&self, domain: Domain, item_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(map) = inner.known.get_mut(&domain) {
            map.remove(item_id);
        }
        Ok(())
    }

    async fn is_seeded(&self, domain: Domain) -> Result<bool> {
        Ok(self.inner.lock().unwrap().seeded.contains(&domain))
    }

    async fn mark_seeded(&self, domain: Domain) -> Result<()> {
        self.inner.lock().unwrap().seeded.insert(domain);
        Ok(())
    }

    async fn append_event(
        &self,
        domain: Domain,
        kind: EventKind,
        item_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        inner.events.push(RecordedEvent {
            domain,
            event_type: kind.as_str().to_string(),
            item_id: item_id.map(|s| s.to_string()),
            payload,
        });
        Ok(inner.events.len() as i64)
    }
}

// ---------------------------------------------------------------------------
// ScriptedFetcher
// ---------------------------------------------------------------------------

/// Serves a fixed script of snapshot results in order. Exhausting the
/// script yields a transient error so a runaway loop fails loudly.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<std::result::Result<Vec<TrackedItem>, FetchError>>>,
    calls: Mutex<usize>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
        }
    }

    pub fn then_ok(self, items: Vec<TrackedItem>) -> Self {
        self.script.lock().unwrap().push_back(Ok(items));
        self
    }

    pub fn then_err(self, err: FetchError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    /// How many fetches the worker issued (confirmation fetches included).
    pub fn fetch_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch(&self, _token: &str) -> std::result::Result<Vec<TrackedItem>, FetchError> {
        *self.calls.lock().unwrap() += 1;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transient("script exhausted".into())))
    }
}

// ---------------------------------------------------------------------------
// Token providers
// ---------------------------------------------------------------------------

pub struct StaticTokens;

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn access_token(&self) -> Result<String> {
        Ok("test-token".to_string())
    }
}

pub struct FailingTokens;

#[async_trait]
impl TokenProvider for FailingTokens {
    async fn access_token(&self) -> Result<String> {
        Err(anyhow!("refresh token revoked"))
    }
}

// ---------------------------------------------------------------------------
// RecordingBus
// ---------------------------------------------------------------------------

/// Captures every publish for assertions. Never fails.
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_to(&self, subject: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == subject)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn total_published(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl EventBus for RecordingBus {
    async fn publish(&self, subject: &str, payload: serde_json::Value) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), payload));
        Ok(())
    }
}
