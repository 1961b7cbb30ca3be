//! # dailystrips
//!
//! Fetches the day's comic strips from their publishers' websites, stores the
//! images locally without duplicating unchanged ones, and writes a dated HTML
//! digest per day with links to the previous and next day.
//!
//! # Architecture
//!
//! A run is a single sequential pass:
//!
//! ```text
//! strips.def ──parse──▶ Collection
//!                         │  for each requested strip
//!                         ├─ fetch search page (+ intermediate page)
//!                         ├─ run patterns → results / errors
//!                         └─ download images → dedup against yesterday
//!                       digest: splice yesterday → render today → swap index.html
//! ```
//!
//! Failures are scoped: a broken pattern only affects its own pattern, a
//! broken page only its own strip. Only a malformed definition file, an
//! unknown strip or group id, or a failure writing the digest stops the run.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`parser`] | Line-oriented strip definition parser with located errors |
//! | [`collection`] | Parsed strips and groups, run timestamp, run orchestration |
//! | [`strip`] | Strip/group types, page fetching, intermediate page hop |
//! | [`pattern`] | Regex patterns with a `result` capture, entity decoding |
//! | [`intermediate`] | Turning an intermediate link into a URL |
//! | [`download`] | Image download, format sniffing, day-to-day symlink dedup |
//! | [`digest`] | Daily HTML digest with Maud, next-day splice, index swap |
//! | [`fetch`] | HTTP seam (`Fetcher` trait) and the reqwest implementation |
//! | [`naming`] | Pattern ids and dated filename conventions |
//! | [`settings`] | Optional `dailystrips.toml` runtime settings |
//! | [`output`] | CLI listings of strips and groups |
//!
//! # Design Decisions
//!
//! ## Symlinks For Unchanged Images
//!
//! Many strips do not update daily. When today's image is byte-identical to
//! yesterday's, today's file is a relative symlink to the original instead
//! of a copy. Links to links are collapsed by one level, so a strip that
//! stays unchanged for a week ends up with every day pointing at the first.
//!
//! ## One Clock Per Run
//!
//! The [`collection::Collection`] is stamped with the run time when it is
//! loaded. Every strip, file name and digest in the run uses that value.

pub mod collection;
pub mod digest;
pub mod download;
pub mod fetch;
pub mod intermediate;
pub mod naming;
pub mod output;
pub mod parser;
pub mod pattern;
pub mod settings;
pub mod strip;

#[cfg(test)]
pub(crate) mod test_helpers;
