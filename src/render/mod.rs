//! Micron page rendering and the output directory the pages land in.
//!
//! Renderers are pure functions from events to page text; only
//! [`RenderContext`] touches the filesystem. Each run builds a fresh context
//! so nothing leaks between runs.

pub mod day;
pub mod index;
pub mod month;

pub use day::render_day;
pub use index::{render_index, IndexPage};
pub use month::render_month;

use crate::error::{AppError, AppResult};
use crate::models::YearMonth;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "index.mu";
pub const DAYS_DIR: &str = "days";
pub const DEFAULT_LINK_PREFIX: &str = "/page/calendar";

/// Builds the link targets other pages use to reach a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLinks {
    prefix: String,
}

impl PageLinks {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn month(&self, month: YearMonth) -> String {
        format!("{}/{}", self.prefix, month_file(month))
    }

    pub fn day(&self, date: NaiveDate) -> String {
        format!("{}/{}/{}", self.prefix, DAYS_DIR, day_file(date))
    }
}

impl Default for PageLinks {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_PREFIX)
    }
}

pub fn month_file(month: YearMonth) -> String {
    format!("{month}.mu")
}

pub fn day_file(date: NaiveDate) -> String {
    format!("{date}.mu")
}

/// Owns the output root for one run and records every page written to it.
#[derive(Debug)]
pub struct RenderContext {
    root: PathBuf,
    links: PageLinks,
    written: BTreeSet<PathBuf>,
}

impl RenderContext {
    pub fn new(root: impl Into<PathBuf>, links: PageLinks) -> Self {
        Self {
            root: root.into(),
            links,
            written: BTreeSet::new(),
        }
    }

    pub fn links(&self) -> &PageLinks {
        &self.links
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn month_path(&self, month: YearMonth) -> PathBuf {
        self.root.join(month_file(month))
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.root.join(DAYS_DIR).join(day_file(date))
    }

    pub fn written_pages(&self) -> impl Iterator<Item = &Path> + '_ {
        self.written.iter().map(PathBuf::as_path)
    }

    /// Replaces `path` with `contents`. The page is written to a temporary
    /// file next to it and renamed into place, so readers see either the old
    /// page or the new one.
    pub fn write_page(&mut self, path: &Path, contents: &str) -> AppResult<()> {
        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir).map_err(|e| AppError::io(dir, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| AppError::io(dir, e))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| AppError::io(path, e))?;
        tmp.persist(path).map_err(|e| AppError::io(path, e.error))?;

        log::debug!("Wrote {} ({} bytes)", path.display(), contents.len());
        self.written.insert(path.to_path_buf());
        Ok(())
    }

    /// Deletes month and day pages left over from earlier runs, i.e. files
    /// named like a page that this context did not write. Returns how many
    /// were removed.
    pub fn prune_stale(&self) -> AppResult<usize> {
        let mut removed = self.prune_dir(&self.root, is_month_file)?;
        removed += self.prune_dir(&self.root.join(DAYS_DIR), is_day_file)?;
        Ok(removed)
    }

    fn prune_dir(&self, dir: &Path, is_page: fn(&str) -> bool) -> AppResult<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(AppError::io(dir, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| AppError::io(dir, e))?;
            let path = entry.path();
            let is_stale_page = path.is_file()
                && path.file_name().and_then(|n| n.to_str()).is_some_and(is_page)
                && !self.written.contains(&path);
            if is_stale_page {
                fs::remove_file(&path).map_err(|e| AppError::io(&path, e))?;
                log::info!("Pruned stale page {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

fn is_month_file(name: &str) -> bool {
    name.strip_suffix(".mu")
        .filter(|stem| stem.len() == 7)
        .is_some_and(|stem| NaiveDate::parse_from_str(&format!("{stem}-01"), "%Y-%m-%d").is_ok())
}

fn is_day_file(name: &str) -> bool {
    name.strip_suffix(".mu")
        .filter(|stem| stem.len() == 10)
        .is_some_and(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").is_ok())
}
