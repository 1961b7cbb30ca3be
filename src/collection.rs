//! The parsed strip collection and run orchestration.
//!
//! A [`Collection`] is built once from the definition file and stamped with
//! the run timestamp. Every strip processed in the run uses that same
//! timestamp, so all of them agree on which day is "today" and which is
//! "yesterday" even if the run crosses midnight.
//!
//! Processing is strictly sequential:
//!
//! ```text
//! for each requested strip:
//!     fetch page (+ intermediate page) → match patterns
//!     if downloading and no strip error: download + dedup every image
//! if downloading:
//!     splice "next day" into yesterday's digest → render today's → swap index.html
//! ```

use crate::digest::{self, DigestOutcome, Renderer};
use crate::fetch::Fetcher;
use crate::parser::{self, ConfigError};
use crate::strip::{Group, Strip};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CollectionError {
    #[error("Strip \"{0}\" is not known")]
    UnknownStrip(String),
    #[error("Group \"{0}\" is not known")]
    UnknownGroup(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-run knobs that are not part of the strip definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Output root. `None` means fetch and match only.
    pub download_dir: Option<&'a Path>,
    /// Stylesheet filename linked from the digest page.
    pub css: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

#[derive(Debug)]
pub struct Collection {
    strips: HashMap<String, Strip>,
    groups: HashMap<String, Group>,
    now: NaiveDateTime,
}

impl Collection {
    /// Assemble a collection from already-validated parts. Group members must
    /// all exist in `strips`.
    pub(crate) fn new(
        strips: HashMap<String, Strip>,
        groups: HashMap<String, Group>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            strips,
            groups,
            now,
        }
    }

    /// Load and parse a definition file.
    pub fn load(path: &Path, now: NaiveDateTime) -> Result<Self, ConfigError> {
        parser::load(path, now)
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Case-insensitive strip lookup.
    pub fn get_strip(&self, id: &str) -> Option<&Strip> {
        self.strips.get(&id.to_lowercase())
    }

    /// Case-insensitive group lookup.
    pub fn get_group(&self, id: &str) -> Option<&Group> {
        self.groups.get(&id.to_lowercase())
    }

    pub fn strip_ids(&self) -> Vec<&str> {
        self.strips.keys().map(String::as_str).collect()
    }

    pub fn group_ids(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// All strips ordered by id.
    pub fn sorted_strips(&self) -> Vec<&Strip> {
        let mut strips: Vec<&Strip> = self.strips.values().collect();
        strips.sort_by(|a, b| a.id.cmp(&b.id));
        strips
    }

    /// All groups ordered by id.
    pub fn sorted_groups(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.values().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        groups
    }

    /// Strips for the given ids, in the given order. Unknown ids are skipped.
    pub fn strips_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Strip> {
        ids.iter()
            .filter_map(|id| self.strips.get(id.as_ref()))
            .collect()
    }

    /// The strips of a group, in group order.
    pub fn group_strips(&self, group: &Group) -> Vec<&Strip> {
        self.strips_by_ids(&group.strip_ids)
    }

    /// Ids to process for a single-strip request.
    pub fn resolve_strip_id(&self, id: &str) -> Result<Vec<String>, CollectionError> {
        let id = id.to_lowercase();
        if self.strips.contains_key(&id) {
            Ok(vec![id])
        } else {
            Err(CollectionError::UnknownStrip(id))
        }
    }

    /// Ids to process for a group request.
    pub fn resolve_group_id(&self, id: &str) -> Result<Vec<String>, CollectionError> {
        self.get_group(id)
            .map(|g| g.strip_ids.clone())
            .ok_or_else(|| CollectionError::UnknownGroup(id.to_lowercase()))
    }

    /// Fetch, match and (optionally) download the given strips, then write
    /// the digest page when downloading.
    ///
    /// Per-strip and per-pattern failures are recorded on the strips; only
    /// an unknown id or a failure writing the digest itself is returned.
    pub fn process_strips(
        &mut self,
        ids: &[String],
        fetcher: &dyn Fetcher,
        renderer: &dyn Renderer,
        opts: &RunOptions<'_>,
    ) -> Result<Option<DigestOutcome>, CollectionError> {
        if let Some(missing) = ids.iter().find(|id| !self.strips.contains_key(*id)) {
            return Err(CollectionError::UnknownStrip(missing.clone()));
        }

        let today = self.today();
        for id in ids {
            let Some(strip) = self.strips.get_mut(id) else {
                continue;
            };
            strip.fetch_html(fetcher, opts.user_agent);
            if let Some(dir) = opts.download_dir
                && strip.error.is_none()
            {
                strip.download(fetcher, dir, today, opts.user_agent);
            }
        }

        let Some(dir) = opts.download_dir else {
            return Ok(None);
        };

        if let Some(css) = opts.css
            && digest::install_stylesheet(dir, css)?
        {
            debug!("Copied default CSS file to: {}", dir.join(css).display());
        }

        let strips = self.strips_by_ids(ids);
        let outcome = digest::write_digest(dir, self.now, strips, opts.css, renderer)?;
        info!("Wrote {}", outcome.path.display());
        Ok(Some(outcome))
    }

    /// Process one strip by id.
    pub fn process_strip_id(
        &mut self,
        id: &str,
        fetcher: &dyn Fetcher,
        renderer: &dyn Renderer,
        opts: &RunOptions<'_>,
    ) -> Result<Option<DigestOutcome>, CollectionError> {
        let ids = self.resolve_strip_id(id)?;
        self.process_strips(&ids, fetcher, renderer, opts)
    }

    /// Process every strip of a group, in group order.
    pub fn process_group_id(
        &mut self,
        id: &str,
        fetcher: &dyn Fetcher,
        renderer: &dyn Renderer,
        opts: &RunOptions<'_>,
    ) -> Result<Option<DigestOutcome>, CollectionError> {
        let ids = self.resolve_group_id(id)?;
        self.process_strips(&ids, fetcher, renderer, opts)
    }
}
