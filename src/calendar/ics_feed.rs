// ICS export/subscription source
// Downloads the whole feed; window filtering happens after normalization.

use crate::calendar::common;
use crate::error::AppResult;
use crate::http_config::HttpConfig;
use crate::models::{FetchWindow, RawEventRecord};
use reqwest::Client;
use std::time::Instant;
use url::Url;

#[derive(Debug, Clone)]
pub struct IcsFeedSource {
    client: Client,
    url: Url,
    username: String,
    password: String,
}

impl IcsFeedSource {
    pub fn new(url: Url, username: &str, password: &str) -> AppResult<Self> {
        Ok(Self {
            client: HttpConfig::ics_fetch().build_client()?,
            url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn fetch(&self, window: &FetchWindow) -> AppResult<Vec<RawEventRecord>> {
        let start_time = Instant::now();
        let shown = common::redact(&self.url);
        log::info!("Fetching ICS data from URL: {shown} (window {} to {})", window.start, window.end);

        let request = common::with_credentials(self.client.get(self.url.clone()), &self.username, &self.password);
        let content = common::send_for_body(request, &format!("GET {shown}")).await?;
        common::check_ics_body(&content)?;

        log::info!(
            "Fetched {} bytes of ICS data in {}ms",
            content.len(),
            start_time.elapsed().as_millis()
        );
        Ok(vec![RawEventRecord::with_href(shown, content)])
    }
}
