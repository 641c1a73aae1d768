use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("No calendars found at {0}")]
    NoCalendars(String),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        Self::Auth(msg.into())
    }

    pub fn calendar<S: Into<String>>(msg: S) -> Self {
        Self::Calendar(msg.into())
    }

    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors raised while talking to the remote calendar. These abort a run
    /// before the output directory is touched.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Auth(_) | Self::NoCalendars(_) | Self::Calendar(_)
        )
    }

    pub fn is_pii_safe(&self) -> bool {
        match self {
            Self::Network(_) | Self::Anyhow(_) | Self::Auth(_) => false,
            Self::NoCalendars(_)
            | Self::Calendar(_)
            | Self::Parse(_)
            | Self::Io { .. }
            | Self::Config(_)
            | Self::InvalidTimezone(_) => true,
        }
    }

    pub fn to_safe_string(&self) -> String {
        if self.is_pii_safe() {
            self.to_string()
        } else {
            match self {
                Self::Network(_) => "Network request failed".to_string(),
                Self::Auth(_) => "Authentication with the calendar server failed".to_string(),
                _ => "Operation failed".to_string(),
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
