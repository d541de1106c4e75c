//! Idempotent schema setup. Run on every boot, before any worker starts.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    // Known set: one row per confirmed item, partitioned by domain.
    r#"
    CREATE TABLE IF NOT EXISTS known_items (
        domain      TEXT        NOT NULL,
        item_id     TEXT        NOT NULL,
        fields      JSONB       NOT NULL,
        observed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (domain, item_id)
    )
    "#,
    // Append-only event log. Rows are write-once; consumers must be
    // idempotent since retries can duplicate bus deliveries.
    r#"
    CREATE TABLE IF NOT EXISTS events (
        id         BIGSERIAL   PRIMARY KEY,
        domain     TEXT        NOT NULL,
        event_type TEXT        NOT NULL,
        item_id    TEXT,
        payload    JSONB       NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS events_domain_created_idx
        ON events (domain, created_at DESC)
    "#,
    // Key/value config. Holds per-domain seed flags.
    r#"
    CREATE TABLE IF NOT EXISTS config (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

pub async fn migrate(pool: &PgPool) -> Result<()> {
    for stmt in STATEMENTS {
        sqlx::query(stmt).execute(pool).await?;
    }
    info!("Migrations complete");
    Ok(())
}
