use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vigil_common::types::Domain;
use vigil_common::Config;
use vigil_engine::auth::OAuthTokenProvider;
use vigil_engine::bus::NatsBus;
use vigil_engine::fetch::PagedFetcher;
use vigil_engine::manager::WorkerManager;
use vigil_engine::worker::{DomainWorker, WatchTuning};
use vigil_engine::youtube::YouTubePages;
use vigil_store::{migrate::migrate, PgStateStore};

const RESTART_DELAY: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vigil=info".parse()?))
        .init();

    info!("Vigil activity watcher starting...");

    // Load config
    let config = Config::from_env();
    config.log_redacted();

    // Connect to Postgres and run migrations (idempotent)
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;
    let store = Arc::new(PgStateStore::new(pool));

    // Connect to NATS
    let bus = Arc::new(NatsBus::connect(&config.nats_url).await?);

    // Shared HTTP client: one timeout policy for token refresh and API pages
    let http = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .build()?;
    let tokens = Arc::new(OAuthTokenProvider::new(
        http.clone(),
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
        config.google_refresh_token.clone(),
    ));

    // One supervised worker per domain
    let manager = WorkerManager::new(bus.clone(), RESTART_DELAY);
    let mut handles = Vec::new();
    for domain in Domain::ALL {
        let tuning = WatchTuning::for_domain(&config, domain);
        let store = store.clone();
        let tokens = tokens.clone();
        let bus = bus.clone();
        let http = http.clone();
        let max_pages = config.max_pages;

        handles.push(manager.spawn(domain, move || {
            let pages = YouTubePages::new(domain, http.clone());
            DomainWorker::new(
                domain,
                tuning.clone(),
                store.clone(),
                Arc::new(PagedFetcher::new(pages, max_pages)),
                tokens.clone(),
                bus.clone(),
            )
        }));
    }

    info!(workers = handles.len(), "All workers spawned");
    futures::future::join_all(handles).await;
    Ok(())
}
