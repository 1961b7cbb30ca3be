//! Shared test utilities.
//!
//! Fixed dates, small real image payloads, and a ready-made strip so module
//! tests do not each have to spell out a full definition.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut strip = sample_strip("test");
//! let fetcher = MockFetcher::new()
//!     .page("https://comic.test/", r#"<img src="/c/1.png">"#)
//!     .bytes("https://comic.test/c/1.png", png_bytes(1));
//! strip.fetch_html(&fetcher, None);
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use crate::pattern::{MAIN_STRIP_TITLE, Pattern};
use crate::strip::Strip;

// =========================================================================
// Dates
// =========================================================================

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Saturday, March 9 2024, 08:30:00. The run time for every fixture.
pub fn run_time() -> NaiveDateTime {
    date(2024, 3, 9).and_hms_opt(8, 30, 0).unwrap()
}

// =========================================================================
// Image payloads
// =========================================================================

/// A tiny real PNG. Different seeds give different bytes.
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(2, 2, Rgb([seed, seed.wrapping_mul(3), 128]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Bytes carrying a GIF signature; enough for format sniffing.
pub fn gif_bytes() -> Vec<u8> {
    let mut bytes = b"GIF89a\x01\x00\x01\x00".to_vec();
    bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00]);
    bytes
}

// =========================================================================
// Strips
// =========================================================================

/// A strip named "Test Comic" at `https://comic.test/` whose main pattern
/// captures the first `<img src>` and prefixes `https://comic.test`.
pub fn sample_strip(id: &str) -> Strip {
    let base_url = "https://comic.test".to_string();
    let mut main = Pattern::image(MAIN_STRIP_TITLE, r#"<img src="(?P<result>[^"]+)""#);
    main.base_url = base_url.clone();
    Strip {
        id: id.to_string(),
        name: "Test Comic".to_string(),
        artist: None,
        homepage: "https://comic.test/".to_string(),
        search_page: "https://comic.test/".to_string(),
        base_url,
        on_hold: false,
        intermediate: None,
        patterns: vec![main],
        error: None,
        fetch_attempted: false,
    }
}
