//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Strip info (print mode, and list mode without the fetch section)
//!
//! ```text
//! xkcd: XKCD
//!     Artist: Randall Munroe
//!     Homepage: https://xkcd.com/
//!     Search Page: https://xkcd.com/
//!     Base URL: https:
//!     Main Strip pattern (Image): <img src="(?P<result>//imgs\.xkcd\.com/comics/[^"]+)"
//!     Title pattern (Text): <img src="//imgs[^"]+" title="(?P<result>[^"]+)"
//!     ------
//!     Main Strip: https://imgs.xkcd.com/comics/tree.png
//!     Title: [Could not find "Title" pattern in HTML]
//! ```
//!
//! ## Group info
//!
//! ```text
//! Group daily:
//!  * garfield - Garfield
//!  * xkcd - XKCD
//! ```
//!
//! # Architecture
//!
//! Each entity has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::collection::Collection;
use crate::strip::{Group, Strip};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn field(name: &str, value: &str) -> String {
    format!("{}{}: {}", indent(1), name, value)
}

/// Format one strip: its definition, then (after a fetch) its results.
pub fn format_strip_info(strip: &Strip) -> Vec<String> {
    let mut lines = vec![format!("{}: {}", strip.id, strip.name)];

    if strip.on_hold {
        lines.push(format!("{}(marked as 'on hold')", indent(1)));
    }
    if let Some(artist) = &strip.artist {
        lines.push(field("Artist", artist));
    }
    lines.push(field("Homepage", &strip.homepage));
    lines.push(field("Search Page", &strip.search_page));
    lines.push(field("Base URL", &strip.base_url));

    if let Some(inter) = &strip.intermediate {
        lines.push(field("Intermediate Pattern", &inter.regex));
        lines.push(field("Intermediate Properties", inter.mode.describe()));
        if let Some(found) = &inter.found {
            lines.push(field("Intermediate Link", found));
        }
        if let Some(url) = &inter.url {
            lines.push(field("Intermediate URL", url));
        }
    }

    for pattern in &strip.patterns {
        lines.push(format!(
            "{}{} pattern ({}): {}",
            indent(1),
            pattern.title,
            pattern.kind.label(),
            pattern.regex
        ));
    }

    if strip.fetch_attempted {
        lines.push(format!("{}------", indent(1)));
        match &strip.error {
            Some(err) => lines.push(field("Error", &err.to_string())),
            None => {
                for pattern in &strip.patterns {
                    let value = match &pattern.error {
                        Some(_) => pattern.error_display(),
                        None => pattern.result().unwrap_or_default(),
                    };
                    lines.push(field(&pattern.title, &value));
                    if let Some(path) = &pattern.file_path {
                        lines.push(format!("{}Saved: {}", indent(2), path.display()));
                    }
                }
            }
        }
    }

    lines
}

/// Print one strip's info block followed by a blank line.
pub fn print_strip_info(strip: &Strip) {
    for line in format_strip_info(strip) {
        println!("{}", line);
    }
    println!();
}

/// Format a group header and one line per member strip.
pub fn format_group_info(group: &Group, collection: &Collection) -> Vec<String> {
    let mut lines = vec![format!("Group {}:", group.id)];
    for strip in collection.group_strips(group) {
        lines.push(format!(" * {} - {}", strip.id, strip.name));
    }
    lines
}

/// Every strip (by id) then every group (by id), blank-line separated.
pub fn format_listing(collection: &Collection) -> Vec<String> {
    let mut lines = Vec::new();
    for strip in collection.sorted_strips() {
        lines.extend(format_strip_info(strip));
        lines.push(String::new());
    }
    for group in collection.sorted_groups() {
        lines.extend(format_group_info(group, collection));
        lines.push(String::new());
    }
    lines
}

pub fn print_listing(collection: &Collection) {
    for line in format_listing(collection) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intermediate::{Intermediate, IntermediateMode};
    use crate::parser::parse;
    use crate::pattern::{Pattern, PatternError};
    use crate::strip::StripError;
    use crate::test_helpers::{run_time, sample_strip};

    #[test]
    fn indent_four_spaces() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    #[test]
    fn unfetched_strip_shows_definition_only() {
        let strip = sample_strip("test");
        let lines = format_strip_info(&strip);
        assert_eq!(lines[0], "test: Test Comic");
        assert!(lines.contains(&"    Homepage: https://comic.test/".to_string()));
        assert!(lines.contains(&"    Base URL: https://comic.test".to_string()));
        assert!(
            lines
                .iter()
                .any(|l| l.starts_with("    Main Strip pattern (Image): "))
        );
        assert!(!lines.iter().any(|l| l.contains("------")));
    }

    #[test]
    fn on_hold_and_artist_lines() {
        let mut strip = sample_strip("test");
        strip.on_hold = true;
        strip.artist = Some("Jim Davis".into());
        let lines = format_strip_info(&strip);
        assert_eq!(lines[1], "    (marked as 'on hold')");
        assert_eq!(lines[2], "    Artist: Jim Davis");
    }

    #[test]
    fn intermediate_lines() {
        let mut strip = sample_strip("test");
        let mut inter = Intermediate::new("href=\"(?P<result>[^\"]+)\"", IntermediateMode::AbsoluteUrl);
        inter.found = Some("https://comic.test/today".into());
        inter.url = Some("https://comic.test/today".into());
        strip.intermediate = Some(inter);
        let lines = format_strip_info(&strip);
        assert!(lines.contains(&"    Intermediate Properties: full URL".to_string()));
        assert!(lines.contains(&"    Intermediate Link: https://comic.test/today".to_string()));
        assert!(lines.contains(&"    Intermediate URL: https://comic.test/today".to_string()));
    }

    #[test]
    fn fetched_strip_shows_results_and_errors() {
        let mut strip = sample_strip("test");
        strip.fetch_attempted = true;
        strip.patterns[0].result = Some("/c/1.png".into());
        let mut title = Pattern::text("Title", "(?P<result>x)");
        title.set_error(PatternError::NotFound {
            title: "Title".into(),
        });
        strip.patterns.push(title);

        let lines = format_strip_info(&strip);
        let after: Vec<&String> = lines
            .iter()
            .skip_while(|l| !l.contains("------"))
            .collect();
        assert_eq!(after[1], "    Main Strip: https://comic.test/c/1.png");
        assert_eq!(
            after[2],
            "    Title: [Could not find \"Title\" pattern in HTML]"
        );
    }

    #[test]
    fn fetched_strip_with_page_error() {
        let mut strip = sample_strip("test");
        strip.fetch_attempted = true;
        strip.error = Some(StripError::IntermediateNotFound {
            name: "Test Comic".into(),
            id: "test".into(),
        });
        let lines = format_strip_info(&strip);
        assert_eq!(
            lines.last().unwrap(),
            "    Error: ERROR: Unable to find intermediate URL for Test Comic (test)"
        );
    }

    #[test]
    fn listing_sorts_strips_then_groups() {
        let defs = "\
strip zed
    name Zed
    homepage https://zed.test/
    searchpattern (?P<result>z)
end
strip alpha
    name Alpha
    homepage https://alpha.test/
    searchpattern (?P<result>a)
end
group mix
    zed
    alpha
end
";
        let collection = parse(defs, "t.def", run_time()).unwrap();
        let lines = format_listing(&collection);
        let headers: Vec<&String> = lines
            .iter()
            .filter(|l| !l.is_empty() && !l.starts_with(' '))
            .collect();
        assert_eq!(headers, vec!["alpha: Alpha", "zed: Zed", "Group mix:"]);
        assert!(lines.contains(&" * zed - Zed".to_string()));
        let zed = lines.iter().position(|l| l == " * zed - Zed").unwrap();
        assert_eq!(lines[zed + 1], " * alpha - Alpha");
    }
}
