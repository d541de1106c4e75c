//! NATS subject names shared with the downloader and notification services.
//! These are wire contracts; changing one requires redeploying consumers.

use crate::types::Domain;

/// Download requests for liked videos. Consumed by the downloader service.
pub const DOWNLOAD_REQUEST: &str = "download.request";

/// Operator-facing notes: seed summaries, backoff alerts, anomaly alerts.
pub const SYSTEM_HEALTH: &str = "system.health";

/// Change notifications for one domain.
pub fn changed(domain: Domain) -> &'static str {
    match domain {
        Domain::LikedVideos => "youtube.likes",
        Domain::Subscriptions => "youtube.subscriptions",
        Domain::WatchHistory => "youtube.watch",
    }
}
