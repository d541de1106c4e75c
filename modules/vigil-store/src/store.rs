//! PgStateStore, the durable source of truth for every worker.
//!
//! Workers re-read the known set at the start of each diff rather than
//! caching it across cycles, so a restarted process resumes from exactly
//! what was last confirmed here.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::warn;

use vigil_common::types::{Domain, EventKind, TrackedItem};

/// An event log row as read back (test utilities and ad-hoc inspection).
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub id: i64,
    pub domain: String,
    pub event_type: String,
    pub item_id: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The full known set for a domain. Rows whose stored fields no longer
    /// deserialize are skipped with a warning; they will be reconciled as
    /// adds on the next accepted snapshot.
    pub async fn known_items(&self, domain: Domain) -> Result<Vec<TrackedItem>> {
        let rows = sqlx::query_as::<_, (String, serde_json::Value)>(
            "SELECT item_id, fields FROM known_items WHERE domain = $1",
        )
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut items = Vec::with_capacity(rows.len());
        for (item_id, fields) in rows {
            match serde_json::from_value::<TrackedItem>(fields) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(domain = %domain, item_id, error = %e, "Skipping corrupt known_items row")
                }
            }
        }
        Ok(items)
    }

    /// Insert or refresh one confirmed item. Idempotent: re-upserting a
    /// known id just refreshes its fields and observed_at.
    pub async fn upsert_known(&self, domain: Domain, item: &TrackedItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO known_items (domain, item_id, fields, observed_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (domain, item_id)
            DO UPDATE SET fields = EXCLUDED.fields, observed_at = now()
            "#,
        )
        .bind(domain.as_str())
        .bind(&item.id)
        .bind(serde_json::to_value(item)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete one confirmed item. Removing an absent id is a no-op.
    pub async fn remove_known(&self, domain: Domain, item_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM known_items WHERE domain = $1 AND item_id = $2")
            .bind(domain.as_str())
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_seeded(&self, domain: Domain) -> Result<bool> {
        let row = sqlx::query_as::<_, (String,)>("SELECT value FROM config WHERE key = $1")
            .bind(seed_key(domain))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v == "true").unwrap_or(false))
    }

    /// Irreversible under normal operation; only `reset_domain` clears it.
    pub async fn mark_seeded(&self, domain: Domain) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO config (key, value) VALUES ($1, 'true')
            ON CONFLICT (key) DO UPDATE SET value = 'true'
            "#,
        )
        .bind(seed_key(domain))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Operator escape hatch for corrupt known-state: drop the partition and
    /// its seed flag so the next cycle re-seeds silently.
    pub async fn reset_domain(&self, domain: Domain) -> Result<()> {
        sqlx::query("DELETE FROM known_items WHERE domain = $1")
            .bind(domain.as_str())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM config WHERE key = $1")
            .bind(seed_key(domain))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append one event log row. Write-once; there is no update path.
    pub async fn append_event(
        &self,
        domain: Domain,
        kind: EventKind,
        item_id: Option<&str>,
        payload: serde_json::Value,
    ) -> Result<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO events (domain, event_type, item_id, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(domain.as_str())
        .bind(kind.as_str())
        .bind(item_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }
}

fn seed_key(domain: Domain) -> String {
    format!("seeded:{}", domain.as_str())
}

// ---------------------------------------------------------------------------
// Test utilities
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl PgStateStore {
    /// Read all events for a domain in insertion order (for tests).
    pub async fn events_for(&self, domain: Domain) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                String,
                String,
                Option<String>,
                serde_json::Value,
                DateTime<Utc>,
            ),
        >(
            r#"
            SELECT id, domain, event_type, item_id, payload, created_at
            FROM events WHERE domain = $1 ORDER BY id ASC
            "#,
        )
        .bind(domain.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, domain, event_type, item_id, payload, created_at)| StoredEvent {
                    id,
                    domain,
                    event_type,
                    item_id,
                    payload,
                    created_at,
                },
            )
            .collect())
    }
}
