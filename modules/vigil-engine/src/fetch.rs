//! Pagination layer over per-page upstream calls.
//!
//! `PagedFetcher` is the enforcement point for the partial-fetch contract:
//! a failure on any page fails the whole snapshot. The pages already
//! accumulated are dropped, never returned as a truncated `Ok`.

use async_trait::async_trait;

use vigil_common::error::FetchError;
use vigil_common::types::TrackedItem;

use crate::traits::SnapshotFetcher;

/// One page of upstream results.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<TrackedItem>,
    pub next_page: Option<String>,
}

/// Fetches a single page for one domain. Implementations must classify
/// upstream errors (quota vs auth vs transient); the pagination layer
/// only decides what a mid-stream failure means for the snapshot.
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn fetch_page(
        &self,
        token: &str,
        page_token: Option<&str>,
    ) -> Result<Page, FetchError>;
}

pub struct PagedFetcher<C> {
    client: C,
    /// Hard stop against a pathological next-page loop.
    max_pages: usize,
}

impl<C: PageClient> PagedFetcher<C> {
    pub fn new(client: C, max_pages: usize) -> Self {
        Self { client, max_pages }
    }
}

#[async_trait]
impl<C: PageClient> SnapshotFetcher for PagedFetcher<C> {
    async fn fetch(&self, token: &str) -> Result<Vec<TrackedItem>, FetchError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages_ok = 0usize;

        loop {
            let page = match self.client.fetch_page(token, page_token.as_deref()).await {
                Ok(page) => page,
                // Quota and auth keep their classification even mid-pagination;
                // anything else after a successful page becomes a partial-fetch
                // failure for the whole call.
                Err(FetchError::QuotaExceeded) => return Err(FetchError::QuotaExceeded),
                Err(FetchError::Auth(msg)) => return Err(FetchError::Auth(msg)),
                Err(e) if pages_ok > 0 => {
                    return Err(FetchError::Partial {
                        fetched: items.len(),
                        pages_ok,
                        cause: e.to_string(),
                    })
                }
                Err(e) => return Err(e),
            };

            items.extend(page.items);
            pages_ok += 1;

            match page.next_page {
                Some(next) if pages_ok >= self.max_pages => {
                    // More pages exist than we're willing to walk. Truncating
                    // here would fabricate removals, so the snapshot fails.
                    return Err(FetchError::Partial {
                        fetched: items.len(),
                        pages_ok,
                        cause: format!("page limit {} reached at token {next}", self.max_pages),
                    });
                }
                Some(next) => page_token = Some(next),
                None => return Ok(items),
            }
        }
    }
}
