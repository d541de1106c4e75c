use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked slice of the user's YouTube activity. Each domain gets its
/// own worker, its own known-set partition, and its own bus subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    LikedVideos,
    Subscriptions,
    WatchHistory,
}

impl Domain {
    pub const ALL: [Domain; 3] = [
        Domain::LikedVideos,
        Domain::Subscriptions,
        Domain::WatchHistory,
    ];

    /// Partition key in the state store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::LikedVideos => "liked_videos",
            Domain::Subscriptions => "subscriptions",
            Domain::WatchHistory => "watch_history",
        }
    }

    /// Field name the item id is published under. Subscriptions are keyed
    /// by channel, everything else by video.
    pub fn id_field(&self) -> &'static str {
        match self {
            Domain::Subscriptions => "channel_id",
            _ => "video_id",
        }
    }

    /// Whether disappearance from a snapshot is a real event. Watch history
    /// only grows; YouTube trimming old entries is not an "unwatch".
    pub fn tracks_removals(&self) -> bool {
        !matches!(self, Domain::WatchHistory)
    }

    /// Whether each accepted add fans out a download request.
    pub fn emits_download_request(&self) -> bool {
        matches!(self, Domain::LikedVideos)
    }

    /// Wire label for a change, matching what downstream formatters expect.
    pub fn action_label(&self, action: ChangeAction) -> &'static str {
        match (self, action) {
            (Domain::LikedVideos, ChangeAction::Added) => "liked",
            (Domain::LikedVideos, ChangeAction::Removed) => "unliked",
            (Domain::Subscriptions, ChangeAction::Added) => "subscribed",
            (Domain::Subscriptions, ChangeAction::Removed) => "unsubscribed",
            (Domain::WatchHistory, _) => "watched",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Added,
    Removed,
}

/// Kind of a row in the append-only event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Add,
    Remove,
    SeedSummary,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Add => "add",
            EventKind::Remove => "remove",
            EventKind::SeedSummary => "seed_summary",
        }
    }
}

/// One item as it appears in a snapshot or in the known set.
///
/// `id` is a video id for likes/history and a channel id for subscriptions.
/// Display fields ride along so downstream consumers never re-query upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl TrackedItem {
    /// Canonical watch/channel URL for this item.
    pub fn url(&self, domain: Domain) -> String {
        match domain {
            Domain::Subscriptions => format!("https://youtube.com/channel/{}", self.id),
            _ => format!("https://youtube.com/watch?v={}", self.id),
        }
    }
}

/// Message published on `download.request`, one per accepted liked-video add.
/// Field names match the downloader's input schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub video_id: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl DownloadRequest {
    pub fn for_item(item: &TrackedItem) -> Self {
        Self {
            video_id: item.id.clone(),
            title: item.title.clone(),
            url: item.url(Domain::LikedVideos),
            channel: item.channel_title.clone(),
            channel_id: item.channel_id.clone(),
            duration: item.duration_seconds.map(format_duration),
            thumbnail: item.thumbnail.clone(),
        }
    }
}

/// Operator-facing note published on `system.health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthNote {
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl HealthNote {
    pub fn new(kind: &str, domain: Option<Domain>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            domain: domain.map(|d| d.as_str().to_string()),
            message: message.into(),
            at: Utc::now(),
        }
    }
}

/// Seconds → "H:MM:SS" or "M:SS", the format the downloader forwards as-is.
pub fn format_duration(seconds: i64) -> String {
    let (h, rest) = (seconds / 3600, seconds % 3600);
    let (m, s) = (rest / 60, rest % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(225), "3:45");
        assert_eq!(format_duration(3705), "1:01:45");
        assert_eq!(format_duration(59), "0:59");
    }

    #[test]
    fn watch_history_never_tracks_removals() {
        assert!(Domain::LikedVideos.tracks_removals());
        assert!(Domain::Subscriptions.tracks_removals());
        assert!(!Domain::WatchHistory.tracks_removals());
    }

    #[test]
    fn only_likes_fan_out_downloads() {
        assert!(Domain::LikedVideos.emits_download_request());
        assert!(!Domain::Subscriptions.emits_download_request());
        assert!(!Domain::WatchHistory.emits_download_request());
    }

    #[test]
    fn download_request_carries_item_metadata() {
        let item = TrackedItem {
            id: "abc123".into(),
            title: "Test".into(),
            channel_id: Some("UC123".into()),
            channel_title: Some("TestChannel".into()),
            duration_seconds: Some(225),
            thumbnail: None,
        };
        let req = DownloadRequest::for_item(&item);
        assert_eq!(req.video_id, "abc123");
        assert_eq!(req.url, "https://youtube.com/watch?v=abc123");
        assert_eq!(req.channel.as_deref(), Some("TestChannel"));
        assert_eq!(req.duration.as_deref(), Some("3:45"));
    }

    #[test]
    fn subscription_action_labels_match_wire_format() {
        assert_eq!(
            Domain::Subscriptions.action_label(ChangeAction::Added),
            "subscribed"
        );
        assert_eq!(
            Domain::Subscriptions.action_label(ChangeAction::Removed),
            "unsubscribed"
        );
    }
}
