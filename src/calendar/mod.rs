// Calendar integration module
// Remote event retrieval (CalDAV or plain ICS export) and normalization.

use crate::config::{SourceConfig, SourceKind};
use crate::error::AppResult;
use crate::models::{FetchWindow, RawEventRecord};
use std::future::Future;

pub mod caldav;
pub mod common;
pub mod ics_feed;
pub mod normalize;
#[cfg(test)]
pub(crate) mod test_server;

pub use caldav::CalDavSource;
pub use ics_feed::IcsFeedSource;
pub use normalize::{normalize, normalize_all, Normalized};

/// Something that can hand out raw calendar data for a time window.
///
/// Implementations return every event intersecting the window and may return
/// more. Any error is fatal for the run.
pub trait EventSource {
    fn describe(&self) -> String;

    fn fetch(&self, window: &FetchWindow) -> impl Future<Output = AppResult<Vec<RawEventRecord>>> + Send;
}

/// The source selected by configuration.
#[derive(Debug, Clone)]
pub enum RemoteSource {
    CalDav(CalDavSource),
    IcsFeed(IcsFeedSource),
}

impl RemoteSource {
    pub fn from_config(config: &SourceConfig) -> AppResult<Self> {
        let url = common::validate_calendar_url(&config.url)?;
        Ok(match config.kind {
            SourceKind::CalDav => Self::CalDav(CalDavSource::new(url, &config.username, &config.password)?),
            SourceKind::Ics => Self::IcsFeed(IcsFeedSource::new(url, &config.username, &config.password)?),
        })
    }
}

impl EventSource for RemoteSource {
    fn describe(&self) -> String {
        match self {
            Self::CalDav(source) => format!("CalDAV {}", common::redact(source.url())),
            Self::IcsFeed(source) => format!("ICS feed {}", common::redact(source.url())),
        }
    }

    async fn fetch(&self, window: &FetchWindow) -> AppResult<Vec<RawEventRecord>> {
        match self {
            Self::CalDav(source) => source.fetch(window).await,
            Self::IcsFeed(source) => source.fetch(window).await,
        }
    }
}
