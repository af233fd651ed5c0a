//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. The primary display
//! for every entity (collection, entry) is its semantic identity: positional
//! index plus title. Filesystem paths come second, as indented `Source:`
//! lines, so the output reads as a content inventory while still letting
//! users trace data back to specific files.
//!
//! # Output Format
//!
//! ## Sync / Check
//!
//! ```text
//! Collections
//! 001 author (data, 1 entry)
//!     Source: src/content/author/
//!     001 ldamore
//!         Source: ldamore.json
//! 002 post (content, 2 entries)
//!     Source: src/content/post/
//!     001 Feature flags
//!         Source: feature-flags/index.mdx
//!         Slug: feature-flags
//!
//! Loaded 2 collections, 3 entries
//! ```
//!
//! ## List
//!
//! ```text
//! 001 Feature flags
//!     Slug: feature-flags
//!     Date: Apr 1, 2023
//! ```
//!
//! ## Render
//!
//! ```text
//! Feature flags (feature-flags)
//!     Reading time: 3 min read
//!     Headings:
//!         h2 Why → #why
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::entry::Entry;
use crate::registry::Registry;
use crate::render::Rendered;
use crate::site::SiteProfile;
use serde_json::Value;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Display title of an entry: `data.title`, else slug, else id.
fn entry_title(entry: &Entry) -> &str {
    entry
        .title()
        .filter(|t| !t.is_empty())
        .or(entry.slug.as_deref())
        .unwrap_or(&entry.id)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// Sync / check
// ============================================================================

pub fn format_sync_output(registry: &Registry, content_dir: &str) -> Vec<String> {
    let mut lines = vec!["Collections".to_string()];
    let mut collections = 0;

    for (ci, name) in registry.collection_names().enumerate() {
        let (Ok(kind), Ok(entries)) = (registry.collection_type(name), registry.get_collection(name))
        else {
            continue;
        };
        collections += 1;
        lines.push(format!(
            "{} {} ({}, {})",
            format_index(ci + 1),
            name,
            kind,
            plural(entries.len(), "entry", "entries")
        ));
        lines.push(format!(
            "{}Source: {}/{}/",
            indent(1),
            content_dir.trim_end_matches('/'),
            name
        ));
        for (ei, entry) in entries.iter().enumerate() {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(ei + 1),
                entry_title(entry)
            ));
            lines.push(format!("{}Source: {}", indent(2), source_name(entry)));
            if let Some(slug) = &entry.slug {
                lines.push(format!("{}Slug: {}", indent(2), slug));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Loaded {}, {}",
        plural(collections, "collection", "collections"),
        plural(registry.entry_count(), "entry", "entries")
    ));
    lines
}

/// File name of a data entry includes its extension; the id does not.
fn source_name(entry: &Entry) -> String {
    match (&entry.slug, &entry.source) {
        (None, Some(path)) => {
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            format!("{}{}", entry.id, ext)
        }
        _ => entry.id.clone(),
    }
}

pub fn print_sync_output(registry: &Registry, content_dir: &str) {
    for line in format_sync_output(registry, content_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// List
// ============================================================================

pub fn format_list_output(entries: &[&Entry], profile: &SiteProfile) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), entry_title(entry)));
        match &entry.slug {
            Some(slug) => lines.push(format!("{}Slug: {}", indent(1), slug)),
            None => lines.push(format!("{}Id: {}", indent(1), entry.id)),
        }
        if let Some(date) = entry
            .data
            .get("publishDate")
            .and_then(Value::as_str)
            .and_then(|raw| profile.format_date_str(raw))
        {
            lines.push(format!("{}Date: {}", indent(1), date));
        }
        if let Some(desc) = entry.data.get("description").and_then(Value::as_str) {
            lines.push(format!("{}Description: {}", indent(1), truncate_desc(desc, 60)));
        }
    }
    if lines.is_empty() {
        lines.push("No entries".to_string());
    }
    lines
}

pub fn print_list_output(entries: &[&Entry], profile: &SiteProfile) {
    for line in format_list_output(entries, profile) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

pub fn format_render_output(entry: &Entry, rendered: &Rendered) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        entry_title(entry),
        entry.slug.as_deref().unwrap_or(&entry.id)
    )];
    if let Some(minutes) = rendered
        .plugin_frontmatter
        .get("minutesRead")
        .and_then(Value::as_str)
    {
        lines.push(format!("{}Reading time: {}", indent(1), minutes));
    }
    if !rendered.headings.is_empty() {
        lines.push(format!("{}Headings:", indent(1)));
        for heading in &rendered.headings {
            lines.push(format!(
                "{}h{} {} → #{}",
                indent(2),
                heading.depth,
                heading.text,
                heading.slug
            ));
        }
    }
    lines
}

pub fn print_render_output(entry: &Entry, rendered: &Rendered) {
    for line in format_render_output(entry, rendered) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionConfig, ContentConfig};
    use crate::entry::RawEntry;
    use crate::render::Heading;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};
    use std::path::PathBuf;

    fn registry() -> Registry {
        let mut config = ContentConfig::new();
        config
            .define("post", CollectionConfig::content())
            .unwrap()
            .define("author", CollectionConfig::data())
            .unwrap();
        let mut author = RawEntry::data("author", "ldamore", json!({"name": "L"}));
        author.source = Some(PathBuf::from("/blog/src/content/author/ldamore.json"));
        Registry::build(
            &config,
            vec![
                RawEntry::content(
                    "post",
                    "feature-flags/index.mdx",
                    json!({"title": "Feature flags"}),
                    "",
                ),
                RawEntry::content("post", "untitled.md", json!({}), ""),
                author,
            ],
        )
        .unwrap()
    }

    #[test]
    fn format_index_zero_padded() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
    }

    #[test]
    fn truncate_desc_respects_char_boundaries() {
        assert_eq!(truncate_desc("short", 10), "short");
        assert_eq!(truncate_desc("ééééé", 2), "éé...");
    }

    #[test]
    fn sync_output_lists_collections_and_entries() {
        let lines = format_sync_output(&registry(), "src/content");
        assert_eq!(
            lines,
            vec![
                "Collections",
                "001 author (data, 1 entry)",
                "    Source: src/content/author/",
                "    001 ldamore",
                "        Source: ldamore.json",
                "002 post (content, 2 entries)",
                "    Source: src/content/post/",
                "    001 Feature flags",
                "        Source: feature-flags/index.mdx",
                "        Slug: feature-flags",
                "    002 untitled",
                "        Source: untitled.md",
                "        Slug: untitled",
                "",
                "Loaded 2 collections, 3 entries",
            ]
        );
    }

    #[test]
    fn list_output_formats_dates_and_descriptions() {
        let entry = Entry {
            id: "a.md".into(),
            slug: Some("a".into()),
            body: Some(String::new()),
            collection: "post".into(),
            data: json!({
                "title": "A",
                "publishDate": "2023-04-01T00:00:00.000Z",
                "description": "Short description",
            }),
            digest: None,
            source: None,
        };
        let lines = format_list_output(&[&entry], &SiteProfile::default());
        assert_eq!(
            lines,
            vec![
                "001 A",
                "    Slug: a",
                "    Date: Apr 1, 2023",
                "    Description: Short description",
            ]
        );
    }

    #[test]
    fn list_output_empty() {
        assert_eq!(format_list_output(&[], &SiteProfile::default()), vec!["No entries"]);
    }

    #[test]
    fn render_output_shows_reading_time_and_headings() {
        let registry = registry();
        let entry = registry.get_entry_by_slug("post", "feature-flags").unwrap().unwrap();
        let mut plugin_frontmatter = Map::new();
        plugin_frontmatter.insert("minutesRead".into(), json!("3 min read"));
        let rendered = Rendered {
            html: String::new(),
            headings: vec![Heading {
                depth: 2,
                slug: "why".into(),
                text: "Why".into(),
            }],
            plugin_frontmatter,
        };
        assert_eq!(
            format_render_output(entry, &rendered),
            vec![
                "Feature flags (feature-flags)",
                "    Reading time: 3 min read",
                "    Headings:",
                "        h2 Why → #why",
            ]
        );
    }
}
