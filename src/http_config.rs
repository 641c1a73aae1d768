//! HTTP client configuration module
//!
//! Centralised timeouts for the calendar fetch. A run never retries, so the
//! only protection against a hung server is a bounded request time.

use crate::error::AppResult;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("micron-calendar/", env!("CARGO_PKG_VERSION"));

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Total request timeout
    pub timeout: Duration,
    /// Redirects followed before giving up
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(45),
            max_redirects: 10,
        }
    }
}

impl HttpConfig {
    /// Create HTTP config for CalDAV discovery and REPORT requests
    pub fn caldav() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(90), // calendar-query over a whole year can be slow
            max_redirects: 10,
        }
    }

    /// Create HTTP config for ICS data fetching
    pub fn ics_fetch() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            timeout: Duration::from_secs(150), // ICS files can be large
            max_redirects: 10,
        }
    }

    /// Build a reqwest client with this configuration
    pub fn build_client(&self) -> AppResult<Client> {
        Ok(ClientBuilder::new()
            .user_agent(USER_AGENT)
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?)
    }
}
