pub mod config;
pub mod error;
pub mod subjects;
pub mod types;

pub use config::Config;
pub use error::FetchError;
pub use types::{ChangeAction, Domain, DownloadRequest, EventKind, HealthNote, TrackedItem};
