// CalDAV event source
// Discovers the calendar collections behind the configured URL and runs a
// time-range calendar-query REPORT against the first one.

use crate::calendar::common;
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::{FetchWindow, RawEventRecord};
use reqwest::{Client, Method};
use roxmltree::{Document, Node};
use url::Url;

const DAV_NS: &str = "DAV:";
const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";

const PRINCIPAL_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:current-user-principal/>
  </d:prop>
</d:propfind>"#;

const HOME_SET_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <c:calendar-home-set/>
  </d:prop>
</d:propfind>"#;

const COLLECTIONS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype/>
    <d:displayname/>
  </d:prop>
</d:propfind>"#;

#[derive(Debug, Clone)]
pub struct CalDavSource {
    client: Client,
    url: Url,
    username: String,
    password: String,
}

impl CalDavSource {
    pub fn new(url: Url, username: &str, password: &str) -> AppResult<Self> {
        Ok(Self {
            client: HttpConfig::caldav().build_client()?,
            url,
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn fetch(&self, window: &FetchWindow) -> AppResult<Vec<RawEventRecord>> {
        let calendar = self.first_calendar().await?;
        log::info!("Querying calendar {}", common::redact(&calendar));

        let body = self
            .dav_request("REPORT", &calendar, "1", calendar_query_body(window))
            .await?;
        let records = parse_calendar_data(&body)?;
        log::info!(
            "Fetched {} calendar resources between {} and {}",
            records.len(),
            window.start,
            window.end
        );
        Ok(records)
    }

    /// Walks principal → calendar home → collections and returns the first
    /// calendar collection found.
    async fn first_calendar(&self) -> AppResult<Url> {
        let body = self
            .dav_request("PROPFIND", &self.url, "0", PRINCIPAL_BODY.to_string())
            .await?;
        let principal = match parse_href_property(&body, DAV_NS, "current-user-principal")? {
            Some(href) => resolve(&self.url, &href)?,
            None => self.url.clone(),
        };
        log::debug!("CalDAV principal: {}", common::redact(&principal));

        let body = self
            .dav_request("PROPFIND", &principal, "0", HOME_SET_BODY.to_string())
            .await?;
        let home = match parse_href_property(&body, CALDAV_NS, "calendar-home-set")? {
            Some(href) => resolve(&principal, &href)?,
            None => principal,
        };
        log::debug!("CalDAV calendar home: {}", common::redact(&home));

        let body = self
            .dav_request("PROPFIND", &home, "1", COLLECTIONS_BODY.to_string())
            .await?;
        let calendars = parse_calendar_collections(&body)?;
        log::info!("Found {} calendar(s)", calendars.len());

        let first = calendars
            .first()
            .ok_or_else(|| AppError::NoCalendars(common::redact(&self.url)))?;
        resolve(&home, first)
    }

    async fn dav_request(&self, method: &str, url: &Url, depth: &str, body: String) -> AppResult<String> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| AppError::calendar(format!("Invalid DAV method {method}: {e}")))?;
        let what = format!("{} {}", method, common::redact(url));

        let request = self
            .client
            .request(method, url.clone())
            .header("Depth", depth)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body);
        let request = common::with_credentials(request, &self.username, &self.password);

        log::debug!("{what}");
        common::send_for_body(request, &what).await
    }
}

/// calendar-query REPORT restricted to `window`, asking the server to expand
/// recurring events into their instances.
pub fn calendar_query_body(window: &FetchWindow) -> String {
    let (start, end) = (window.caldav_start(), window.caldav_end());
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data>
      <c:expand start="{start}" end="{end}"/>
    </c:calendar-data>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:time-range start="{start}" end="{end}"/>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#
    )
}

fn parse_multistatus(xml: &str) -> AppResult<Document<'_>> {
    Document::parse(xml)
        .map_err(|e| AppError::calendar(format!("Malformed multistatus response: {e}")))
}

fn resolve(base: &Url, href: &str) -> AppResult<Url> {
    base.join(href)
        .map_err(|e| AppError::calendar(format!("Invalid href '{href}' from server: {e}")))
}

fn text_of(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<String>()
}

fn href_of(node: Node<'_, '_>) -> Option<String> {
    node.descendants()
        .find(|n| n.has_tag_name((DAV_NS, "href")))
        .map(|n| text_of(n).trim().to_string())
        .filter(|href| !href.is_empty())
}

/// First `<href>` inside the property `ns:name` of a PROPFIND response.
pub fn parse_href_property(xml: &str, ns: &str, name: &str) -> AppResult<Option<String>> {
    let doc = parse_multistatus(xml)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name((ns, name)))
        .find_map(href_of))
}

/// Hrefs of every response whose resourcetype marks a CalDAV calendar.
pub fn parse_calendar_collections(xml: &str) -> AppResult<Vec<String>> {
    let doc = parse_multistatus(xml)?;
    let calendars = doc
        .descendants()
        .filter(|n| n.has_tag_name((DAV_NS, "response")))
        .filter(|response| {
            response
                .descendants()
                .filter(|n| n.has_tag_name((DAV_NS, "resourcetype")))
                .any(|rt| rt.children().any(|c| c.has_tag_name((CALDAV_NS, "calendar"))))
        })
        .filter_map(|response| {
            response
                .children()
                .find(|n| n.has_tag_name((DAV_NS, "href")))
                .map(|n| text_of(n).trim().to_string())
        })
        .filter(|href| !href.is_empty())
        .collect();
    Ok(calendars)
}

/// One raw record per `calendar-data` element of a REPORT response.
pub fn parse_calendar_data(xml: &str) -> AppResult<Vec<RawEventRecord>> {
    let doc = parse_multistatus(xml)?;
    let records = doc
        .descendants()
        .filter(|n| n.has_tag_name((DAV_NS, "response")))
        .filter_map(|response| {
            let data = response
                .descendants()
                .find(|n| n.has_tag_name((CALDAV_NS, "calendar-data")))
                .map(text_of)?;
            if data.trim().is_empty() {
                return None;
            }
            let href = response
                .children()
                .find(|n| n.has_tag_name((DAV_NS, "href")))
                .map(|n| text_of(n).trim().to_string());
            Some(RawEventRecord { href, data })
        })
        .collect();
    Ok(records)
}
