use crate::error::{AppError, AppResult};
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::str::FromStr;
use url::Url;

/// Validates a calendar endpoint URL for format correctness
pub fn validate_calendar_url(calendar_url: &str) -> AppResult<Url> {
    // Check for empty or whitespace-only URL
    if calendar_url.trim().is_empty() {
        return Err(AppError::config(
            "Calendar URL cannot be empty. Please provide the CalDAV or ICS export URL.",
        ));
    }

    let parsed_url = Url::parse(calendar_url.trim()).map_err(|e| {
        AppError::config(format!(
            "Invalid calendar URL format: {e}. Please ensure the URL is properly formatted (e.g., https://cloud.example.com/remote.php/dav/)"
        ))
    })?;

    match parsed_url.scheme() {
        "https" => {}
        "http" => {
            // self-hosted servers on a LAN commonly run without TLS
            log::warn!(
                "Calendar URL uses plain HTTP; credentials will be sent unencrypted: {}",
                redact(&parsed_url)
            );
        }
        other => {
            return Err(AppError::config(format!(
                "Calendar URL must use http or https, not '{other}://'"
            )));
        }
    }

    match parsed_url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => {
            return Err(AppError::config(format!(
                "Calendar URL must have a valid host name. The provided URL '{calendar_url}' does not contain one."
            )));
        }
    }

    Ok(parsed_url)
}

/// URL without userinfo, safe for log lines.
pub fn redact(url: &Url) -> String {
    let mut url = url.clone();
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.to_string()
}

/// Adds basic auth when a username is configured.
pub fn with_credentials(request: RequestBuilder, username: &str, password: &str) -> RequestBuilder {
    if username.is_empty() {
        request
    } else {
        request.basic_auth(username, Some(password))
    }
}

/// Sends `request` and returns the body of a successful response.
///
/// 401/403 become [`AppError::Auth`]; every other non-success status is a
/// network error.
pub async fn send_for_body(request: RequestBuilder, what: &str) -> AppResult<String> {
    let response = request.send().await?;
    let response = check_status(response, what)?;
    Ok(response.text().await?)
}

fn check_status(response: Response, what: &str) -> AppResult<Response> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::auth(format!(
            "{what} was rejected with HTTP {}; check the configured username and password",
            response.status()
        ))),
        _ => Ok(response.error_for_status()?),
    }
}

/// Rejects bodies that are clearly not iCalendar data.
pub fn check_ics_body(content: &str) -> AppResult<()> {
    let trimmed = content.trim_start();
    if trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html") {
        return Err(AppError::calendar(
            "The server returned HTML instead of a calendar file. Please use the calendar's export or subscription URL, not the web interface URL.",
        ));
    }
    if !content.contains("BEGIN:VCALENDAR") {
        log::warn!("Content does not contain BEGIN:VCALENDAR.");
    }
    Ok(())
}

/// Converts an iCalendar date or date-time into the configured zone.
///
/// Floating times and all-day dates carry no zone of their own and are read
/// as local time in `tz`. A `TZID` unknown to the timezone database falls back
/// to `tz` as well.
pub fn parse_ical_datetime(dt: &icalendar::DatePerhapsTime, tz: Tz) -> Option<DateTime<Tz>> {
    match dt {
        icalendar::DatePerhapsTime::DateTime(dt) => match dt {
            icalendar::CalendarDateTime::Utc(dt) => Some(dt.with_timezone(&tz)),

            icalendar::CalendarDateTime::Floating(naive_dt) => {
                tz.from_local_datetime(naive_dt).earliest()
            }

            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                let zone = Tz::from_str(tzid).unwrap_or_else(|_| {
                    log::warn!("Unrecognized timezone '{}', treating as {}", tzid, tz.name());
                    tz
                });
                zone.from_local_datetime(date_time)
                    .earliest()
                    .map(|zoned| zoned.with_timezone(&tz))
            }
        },
        icalendar::DatePerhapsTime::Date(date) => {
            Some(crate::planner::start_of_day(*date, tz).with_timezone(&tz))
        }
    }
}
