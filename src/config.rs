//! Configuration loading and validation
//!
//! Settings come from a TOML file (path in `MICRON_CALENDAR_CONFIG`, default
//! `micron-calendar.toml`) and can be overridden per field from the
//! environment. A missing file is not an error; defaults plus environment
//! are enough to run.

use crate::error::{AppError, AppResult};
use crate::render::DEFAULT_LINK_PREFIX;
use chrono_tz::Tz;
use log::info;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "MICRON_CALENDAR_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "micron-calendar.toml";

const URL_ENV: &str = "MICRON_CALENDAR_URL";
const USERNAME_ENV: &str = "MICRON_CALENDAR_USERNAME";
const PASSWORD_ENV: &str = "MICRON_CALENDAR_PASSWORD";
const TIMEZONE_ENV: &str = "MICRON_CALENDAR_TIMEZONE";
const OUTPUT_ENV: &str = "MICRON_CALENDAR_OUTPUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// CalDAV server; calendars are discovered from the URL.
    CalDav,
    /// Plain iCalendar export or subscription URL.
    Ics,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::CalDav,
            url: String::new(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    pub link_prefix: String,
    pub prune_stale: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("calendar"),
            link_prefix: DEFAULT_LINK_PREFIX.to_string(),
            prune_stale: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_hours: u64,
    pub run_once: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            run_once: false,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(60 * 60))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA zone used to assign events to dates and to format times.
    pub timezone: String,
    pub source: SourceConfig,
    pub output: OutputConfig,
    pub schedule: ScheduleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            source: SourceConfig::default(),
            output: OutputConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Config {
    /// Loads the file named by `MICRON_CALENDAR_CONFIG` (or the default path),
    /// applies environment overrides and validates the result.
    pub fn load() -> AppResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_or_default(Path::new(&path))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> AppResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                info!("Loading configuration from {}", path.display());
                Self::from_toml(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No configuration file at {}, using defaults and environment", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(AppError::io(path, e)),
        }
    }

    pub fn from_toml(contents: &str) -> AppResult<Self> {
        toml::from_str(contents).map_err(|e| AppError::config(format!("Invalid configuration file: {e}")))
    }

    /// Overrides fields from `lookup`, which maps environment variable names
    /// to values.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(URL_ENV) {
            self.source.url = url;
        }
        if let Some(username) = lookup(USERNAME_ENV) {
            self.source.username = username;
        }
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.source.password = password;
        }
        if let Some(timezone) = lookup(TIMEZONE_ENV) {
            self.timezone = timezone;
        }
        if let Some(root) = lookup(OUTPUT_ENV) {
            self.output.root = PathBuf::from(root);
        }
    }

    /// Parsed display timezone.
    pub fn tz(&self) -> AppResult<Tz> {
        Tz::from_str(self.timezone.trim()).map_err(|_| AppError::InvalidTimezone(self.timezone.clone()))
    }

    /// Validates basic application configuration
    pub fn validate(&self) -> AppResult<()> {
        crate::calendar::common::validate_calendar_url(&self.source.url)?;
        let tz = self.tz()?;
        if self.output.root.as_os_str().is_empty() {
            return Err(AppError::config("output.root cannot be empty"));
        }
        if self.schedule.interval_hours == 0 {
            return Err(AppError::config("schedule.interval_hours must be at least 1"));
        }
        if self.source.username.is_empty() != self.source.password.is_empty() {
            log::warn!("Only one of username/password is set; requests may be rejected");
        }
        info!(
            "Configuration valid: {:?} source, timezone {}, output {}",
            self.source.kind,
            tz.name(),
            self.output.root.display()
        );
        Ok(())
    }
}
