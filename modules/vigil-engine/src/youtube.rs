//! YouTube Data API v3 page client.
//!
//! One endpoint per domain: `videos?myRating=like` for likes,
//! `subscriptions?mine=true` for subscriptions, and the `HL` history
//! playlist via `playlistItems` for watch history. Entries that fail to
//! parse are skipped individually. Noise in one entry must not fail the
//! page, and a failed page must not become a truncated snapshot.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use vigil_common::error::FetchError;
use vigil_common::types::{Domain, TrackedItem};

use crate::fetch::{Page, PageClient};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE: u32 = 50;

/// Quota-class error reasons from the API's 403 envelope.
const QUOTA_REASONS: &[&str] = &[
    "quotaExceeded",
    "dailyLimitExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
];

pub struct YouTubePages {
    http: reqwest::Client,
    domain: Domain,
}

impl YouTubePages {
    /// `http` should carry the fetch timeout; a timed-out page is a
    /// transient error, not a quota signal.
    pub fn new(domain: Domain, http: reqwest::Client) -> Self {
        Self { http, domain }
    }

    fn request_url(&self, page_token: Option<&str>) -> String {
        let mut url = match self.domain {
            Domain::LikedVideos => format!(
                "{API_BASE}/videos?myRating=like&part=snippet,contentDetails&maxResults={PAGE_SIZE}"
            ),
            Domain::Subscriptions => {
                format!("{API_BASE}/subscriptions?mine=true&part=snippet&maxResults={PAGE_SIZE}")
            }
            Domain::WatchHistory => {
                format!("{API_BASE}/playlistItems?playlistId=HL&part=snippet&maxResults={PAGE_SIZE}")
            }
        };
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(token);
        }
        url
    }
}

#[async_trait]
impl PageClient for YouTubePages {
    async fn fetch_page(
        &self,
        token: &str,
        page_token: Option<&str>,
    ) -> Result<Page, FetchError> {
        let response = self
            .http
            .get(self.request_url(page_token))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Transient(format!("bad response body: {e}")))?;

        if !status.is_success() {
            return Err(classify_api_error(status.as_u16(), &body));
        }

        Ok(parse_page(self.domain, &body))
    }
}

/// Map a non-2xx API envelope onto the fetch taxonomy.
fn classify_api_error(status: u16, body: &Value) -> FetchError {
    let reason = body["error"]["errors"][0]["reason"].as_str().unwrap_or("");
    let message = body["error"]["message"].as_str().unwrap_or("no message");

    if status == 403 && QUOTA_REASONS.contains(&reason) {
        FetchError::QuotaExceeded
    } else if status == 401 || status == 403 {
        FetchError::Auth(format!("{status} {reason}: {message}"))
    } else {
        FetchError::Transient(format!("upstream {status} {reason}: {message}"))
    }
}

fn parse_page(domain: Domain, body: &Value) -> Page {
    let raw_items = body["items"].as_array().cloned().unwrap_or_default();

    let mut items = Vec::with_capacity(raw_items.len());
    for entry in &raw_items {
        match parse_entry(domain, entry) {
            Some(item) => items.push(item),
            None => warn!(%domain, "Skipping unparseable upstream entry"),
        }
    }

    Page {
        items,
        next_page: body["nextPageToken"].as_str().map(|s| s.to_string()),
    }
}

fn parse_entry(domain: Domain, entry: &Value) -> Option<TrackedItem> {
    let snippet = &entry["snippet"];
    let (id, channel_id) = match domain {
        Domain::LikedVideos => (
            entry["id"].as_str()?,
            snippet["channelId"].as_str().map(|s| s.to_string()),
        ),
        Domain::Subscriptions => {
            let channel = snippet["resourceId"]["channelId"].as_str()?;
            (channel, Some(channel.to_string()))
        }
        Domain::WatchHistory => (
            snippet["resourceId"]["videoId"].as_str()?,
            snippet["videoOwnerChannelId"].as_str().map(|s| s.to_string()),
        ),
    };

    let channel_title = match domain {
        Domain::Subscriptions => None,
        Domain::WatchHistory => snippet["videoOwnerChannelTitle"]
            .as_str()
            .map(|s| s.to_string()),
        Domain::LikedVideos => snippet["channelTitle"].as_str().map(|s| s.to_string()),
    };

    Some(TrackedItem {
        id: id.to_string(),
        title: snippet["title"].as_str()?.to_string(),
        channel_id,
        channel_title,
        duration_seconds: entry["contentDetails"]["duration"]
            .as_str()
            .and_then(parse_iso8601_duration),
        thumbnail: best_thumbnail(snippet),
    })
}

fn best_thumbnail(snippet: &Value) -> Option<String> {
    for quality in ["maxres", "high", "medium", "default"] {
        if let Some(url) = snippet["thumbnails"][quality]["url"].as_str() {
            return Some(url.to_string());
        }
    }
    None
}

/// "PT1H2M3S" → 3723. Returns None for anything that doesn't scan.
fn parse_iso8601_duration(s: &str) -> Option<i64> {
    let rest = s.strip_prefix("PT")?;
    let mut total: i64 = 0;
    let mut number = String::new();
    for c in rest.chars() {
        if c.is_ascii_digit() {
            number.push(c);
        } else {
            let n: i64 = number.parse().ok()?;
            number.clear();
            total += match c {
                'H' => n * 3600,
                'M' => n * 60,
                'S' => n,
                _ => return None,
            };
        }
    }
    if number.is_empty() {
        Some(total)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn iso8601_durations() {
        assert_eq!(parse_iso8601_duration("PT3M45S"), Some(225));
        assert_eq!(parse_iso8601_duration("PT1H1M45S"), Some(3705));
        assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
        assert_eq!(parse_iso8601_duration("PT2H"), Some(7200));
        assert_eq!(parse_iso8601_duration("3M45S"), None);
        assert_eq!(parse_iso8601_duration("PT3X"), None);
    }

    #[test]
    fn parses_liked_video_entry() {
        let body = json!({
            "items": [{
                "id": "abc123",
                "snippet": {
                    "title": "A video",
                    "channelId": "UC1",
                    "channelTitle": "A channel",
                    "thumbnails": {"high": {"url": "https://i.ytimg.com/hi.jpg"}}
                },
                "contentDetails": {"duration": "PT3M45S"}
            }],
            "nextPageToken": "t2"
        });
        let page = parse_page(Domain::LikedVideos, &body);
        assert_eq!(page.items.len(), 1);
        let item = &page.items[0];
        assert_eq!(item.id, "abc123");
        assert_eq!(item.channel_title.as_deref(), Some("A channel"));
        assert_eq!(item.duration_seconds, Some(225));
        assert_eq!(item.thumbnail.as_deref(), Some("https://i.ytimg.com/hi.jpg"));
        assert_eq!(page.next_page.as_deref(), Some("t2"));
    }

    #[test]
    fn parses_subscription_entry_keyed_by_channel() {
        let body = json!({
            "items": [{
                "snippet": {
                    "title": "A channel",
                    "resourceId": {"channelId": "UC42"}
                }
            }]
        });
        let page = parse_page(Domain::Subscriptions, &body);
        assert_eq!(page.items[0].id, "UC42");
        assert_eq!(page.items[0].channel_id.as_deref(), Some("UC42"));
        assert!(page.next_page.is_none());
    }

    #[test]
    fn unparseable_entry_is_skipped_not_fatal() {
        let body = json!({
            "items": [
                {"snippet": {"garbage": true}},
                {"id": "ok1", "snippet": {"title": "fine"}}
            ]
        });
        let page = parse_page(Domain::LikedVideos, &body);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "ok1");
    }

    #[test]
    fn quota_reason_classified_as_quota() {
        let body = json!({
            "error": {"message": "Quota exceeded", "errors": [{"reason": "quotaExceeded"}]}
        });
        assert!(matches!(
            classify_api_error(403, &body),
            FetchError::QuotaExceeded
        ));
    }

    #[test]
    fn forbidden_without_quota_reason_is_auth() {
        let body = json!({
            "error": {"message": "Invalid credentials", "errors": [{"reason": "authError"}]}
        });
        assert!(matches!(classify_api_error(401, &body), FetchError::Auth(_)));
    }

    #[test]
    fn server_error_is_transient() {
        let body = json!({"error": {"message": "backend error", "errors": [{"reason": "backendError"}]}});
        assert!(matches!(
            classify_api_error(503, &body),
            FetchError::Transient(_)
        ));
    }
}
