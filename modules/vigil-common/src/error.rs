use thiserror::Error;

/// Failure modes of one snapshot fetch. The worker branches on these:
/// quota escalates backoff, auth pages the operator, everything else
/// retries at the normal interval with the known set untouched.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Upstream signalled rate limiting. The only variant that escalates backoff.
    #[error("upstream quota exceeded")]
    QuotaExceeded,

    /// A page failed mid-pagination. The pages already fetched are discarded;
    /// returning them as a snapshot would make every unfetched item look removed.
    #[error("partial fetch: {fetched} items over {pages_ok} page(s), then: {cause}")]
    Partial {
        fetched: usize,
        pages_ok: usize,
        cause: String,
    },

    /// Credential rejected or unobtainable.
    #[error("auth failure: {0}")]
    Auth(String),

    /// Anything else: network, timeout, 5xx, malformed response envelope.
    #[error("fetch failed: {0}")]
    Transient(String),
}
