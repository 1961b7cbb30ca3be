//! Image download and day-to-day deduplication.
//!
//! Each image pattern with a result is fetched, its real format is sniffed
//! from the bytes, and it is stored as `YYYY-MM-DD-<id>.<ext>` in the strip's
//! directory. When yesterday's file holds exactly the same bytes, today's
//! file becomes a symlink instead of a copy:
//!
//! ```text
//! Garfield/
//! ├── 2024-03-07-main_strip.gif                 # real file
//! ├── 2024-03-08-main_strip.gif -> 2024-03-07-main_strip.gif
//! └── 2024-03-09-main_strip.gif -> 2024-03-07-main_strip.gif
//! ```
//!
//! If yesterday's file is itself a link, today links to *its* target. Only
//! that one level is collapsed; longer chains are not walked. The link
//! target's date prefix becomes the pattern's "unchanged since" date, falling
//! back to the target's mtime when the name carries no date.
//!
//! Nothing in here returns an error to the caller: every failure is recorded
//! on the pattern and the caller moves on to the next one.

use crate::fetch::{Fetcher, request_headers};
use crate::naming;
use crate::pattern::{Pattern, PatternError};
use chrono::{DateTime, Local, NaiveDate};
use image::ImageFormat;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything a pattern download needs from its strip and the run.
pub struct DownloadContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    /// The strip's own directory inside the output root.
    pub dir: &'a Path,
    /// Directory component of the public path (the strip name, unescaped).
    pub link_dir: &'a str,
    /// Run date; "yesterday" is derived from it.
    pub today: NaiveDate,
    pub referer: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

/// File extension for the image format detected in `bytes`.
///
/// PNG, JPEG, GIF and WebP map to their usual extensions; anything else the
/// sniffer recognizes falls back to its lower-cased format name.
pub fn sniff_extension(bytes: &[u8]) -> Result<String, String> {
    let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
    Ok(match format {
        ImageFormat::Png => "png".to_string(),
        ImageFormat::Jpeg => "jpg".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        other => format!("{other:?}").to_lowercase(),
    })
}

/// What happened to today's file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    /// New bytes written to disk.
    Written,
    /// Linked to an identical earlier file; holds the link target as written.
    Linked(PathBuf),
}

/// Store `bytes` as today's file, linking to yesterday's when identical.
///
/// `today_name` and `yesterday_name` are bare filenames inside `dir`.
pub fn store_deduplicated(
    dir: &Path,
    today_name: &str,
    yesterday_name: &str,
    bytes: &[u8],
) -> io::Result<Stored> {
    let today_path = dir.join(today_name);
    let yesterday_path = dir.join(yesterday_name);

    // A same-day rerun may have left a file or a link here. Writing through
    // a link would clobber the earlier day's file, so always remove first.
    if today_path.symlink_metadata().is_ok() {
        fs::remove_file(&today_path)?;
    }

    if yesterday_path.exists() {
        debug!("    Previous file exists, checking contents.");
        let previous = fs::read(&yesterday_path)?;
        if previous == bytes {
            debug!("    Previous strip is the same, just symlinking");
            let target = if yesterday_path.is_symlink() {
                fs::read_link(&yesterday_path)?
            } else {
                PathBuf::from(yesterday_name)
            };
            symlink(&target, &today_path)?;
            return Ok(Stored::Linked(target));
        }
    }

    fs::write(&today_path, bytes)?;
    debug!("    Saved at {}", today_path.display());
    Ok(Stored::Written)
}

/// Date a link target has been unchanged since.
///
/// Parsed from the target's `YYYY-MM-DD-` filename prefix; otherwise the
/// target file's mtime. `None` when neither is available.
pub fn unchanged_since(dir: &Path, target: &Path) -> Option<NaiveDate> {
    let from_name = target
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(naming::parse_dated_filename);
    if from_name.is_some() {
        return from_name;
    }
    let full = if target.is_absolute() {
        target.to_path_buf()
    } else {
        dir.join(target)
    };
    debug!("    Previous filename cannot be parsed, using previous file's mtime");
    let modified = fs::metadata(full).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).date_naive())
}

#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Percent-encode a strip directory name for use in a digest link.
/// Path separators stay literal.
pub fn public_dir(name: &str) -> String {
    urlencoding::encode(name).replace("%2F", "/")
}

impl Pattern {
    /// Download this pattern's image into `ctx.dir`.
    ///
    /// Text patterns and patterns without a result (or with an error) are
    /// skipped. On success `url`, `file_path` and possibly `unchanged_since`
    /// are set; on failure only `error` is.
    pub fn download_to(&mut self, ctx: &DownloadContext<'_>) {
        if !self.is_image() || self.error.is_some() {
            return;
        }
        let Some(source) = self.result() else {
            return;
        };

        debug!(" * Fetching \"{}\" image at URL: {}", self.title, source);
        let headers = request_headers(ctx.user_agent, ctx.referer);
        let bytes = match ctx.fetcher.get(&source, &headers) {
            Ok(resp) if resp.is_ok() => resp.body,
            Ok(resp) => {
                self.set_error(PatternError::Http {
                    status: resp.status,
                    reason: resp.reason,
                });
                return;
            }
            Err(e) => {
                self.set_error(PatternError::Transport {
                    title: self.title.clone(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let ext = match sniff_extension(&bytes) {
            Ok(ext) => ext,
            Err(message) => {
                self.set_error(PatternError::UnknownImageType {
                    title: self.title.clone(),
                    message,
                });
                return;
            }
        };

        let yesterday = ctx.today.pred_opt().unwrap_or(ctx.today);
        let today_name = naming::dated_filename(ctx.today, &self.id, &ext);
        let yesterday_name = naming::dated_filename(yesterday, &self.id, &ext);

        match store_deduplicated(ctx.dir, &today_name, &yesterday_name, &bytes) {
            Ok(Stored::Written) => {}
            Ok(Stored::Linked(target)) => {
                self.unchanged_since = unchanged_since(ctx.dir, &target);
            }
            Err(e) => {
                self.set_error(PatternError::Save {
                    title: self.title.clone(),
                    message: e.to_string(),
                });
                return;
            }
        }

        self.url = Some(format!("{}/{}", public_dir(ctx.link_dir), today_name));
        self.file_path = Some(ctx.dir.join(&today_name));
    }
}
