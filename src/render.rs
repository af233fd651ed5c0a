//! Render a content entry's Markdown body to HTML.
//!
//! Rendering is a pass over pulldown-cmark events:
//!
//! 1. Parse the body with GitHub-flavored extensions.
//! 2. Give every heading an `id` anchor (GitHub-style slug, deduplicated).
//! 3. Run the configured remark plugins in order.
//! 4. Serialize the events to HTML.
//!
//! Plugins may add values to [`Rendered::plugin_frontmatter`], which page
//! templates read next to the entry's validated data (e.g. `minutesRead`).

use crate::config::{MarkdownConfig, RemarkPlugin};
use crate::entry::Entry;
use crate::slug::Slugger;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Average reading speed used by the `reading-time` plugin.
pub const WORDS_PER_MINUTE: usize = 200;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{collection} → {id} is a data entry and has no body to render")]
    NotRenderable { collection: String, id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// 1 for `#`, up to 6.
    pub depth: u8,
    pub slug: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub html: String,
    pub headings: Vec<Heading>,
    pub plugin_frontmatter: Map<String, Value>,
}

/// Render a content entry. Data entries have no body and fail with `NotRenderable`.
pub fn render(entry: &Entry, markdown: &MarkdownConfig) -> Result<Rendered, RenderError> {
    match (&entry.slug, &entry.body) {
        (Some(_), Some(body)) => Ok(render_markdown(body, markdown)),
        _ => Err(RenderError::NotRenderable {
            collection: entry.collection.clone(),
            id: entry.id.clone(),
        }),
    }
}

pub fn render_markdown(body: &str, markdown: &MarkdownConfig) -> Rendered {
    let events: Vec<Event<'_>> = Parser::new_ext(body, parser_options()).collect();
    let (mut events, headings) = anchor_headings(events);

    let mut plugin_frontmatter = Map::new();
    for plugin in &markdown.remark_plugins {
        match plugin {
            RemarkPlugin::ReadingTime => {
                let minutes = reading_minutes(&events);
                plugin_frontmatter.insert(
                    "minutesRead".to_string(),
                    Value::String(format!("{minutes} min read")),
                );
            }
            RemarkPlugin::UnwrapImages => events = unwrap_images(events),
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    Rendered {
        html: out,
        headings,
        plugin_frontmatter,
    }
}

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_GFM);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options
}

/// Collect headings and set each heading's `id` to its slug.
fn anchor_headings(events: Vec<Event<'_>>) -> (Vec<Event<'_>>, Vec<Heading>) {
    let mut slugger = Slugger::new();
    let mut headings = Vec::new();
    let mut current: Option<(u8, String)> = None;

    for event in &events {
        match event {
            Event::Start(Tag::Heading { level, .. }) => current = Some((*level as u8, String::new())),
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = current.as_mut() {
                    buf.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((depth, text)) = current.take() {
                    let slug = slugger.slug(&text);
                    headings.push(Heading { depth, slug, text });
                }
            }
            _ => {}
        }
    }

    let mut slugs = headings.iter().map(|h| h.slug.clone());
    let events = events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => Event::Start(Tag::Heading {
                level,
                id: slugs.next().map(CowStr::from).or(id),
                classes,
                attrs,
            }),
            other => other,
        })
        .collect();
    (events, headings)
}

/// Minutes to read the text of `events`, rounded up, at least one.
fn reading_minutes(events: &[Event<'_>]) -> usize {
    let words: usize = events
        .iter()
        .map(|event| match event {
            Event::Text(text) | Event::Code(text) => text.split_whitespace().count(),
            _ => 0,
        })
        .sum();
    words.div_ceil(WORDS_PER_MINUTE).max(1)
}

/// Drop the `<p>` around paragraphs that hold nothing but images.
fn unwrap_images(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;
    while i < events.len() {
        if matches!(events[i], Event::Start(Tag::Paragraph)) {
            let end = events[i + 1..]
                .iter()
                .position(|e| matches!(e, Event::End(TagEnd::Paragraph)))
                .map(|offset| i + 1 + offset);
            if let Some(end) = end.filter(|&end| only_images(&events[i + 1..end])) {
                out.extend(events[i + 1..end].iter().cloned());
                i = end + 1;
                continue;
            }
        }
        out.push(events[i].clone());
        i += 1;
    }
    out
}

fn only_images(events: &[Event<'_>]) -> bool {
    let mut depth = 0usize;
    let mut images = 0usize;
    for event in events {
        match event {
            Event::Start(Tag::Image { .. }) => {
                if depth == 0 {
                    images += 1;
                }
                depth += 1;
            }
            Event::End(TagEnd::Image) => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            Event::Start(Tag::Link { .. }) | Event::End(TagEnd::Link) => {}
            Event::SoftBreak | Event::HardBreak => {}
            Event::Text(text) if text.trim().is_empty() => {}
            _ => return false,
        }
    }
    images > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plugins(list: &[RemarkPlugin]) -> MarkdownConfig {
        MarkdownConfig {
            remark_plugins: list.to_vec(),
            ..MarkdownConfig::default()
        }
    }

    fn content_entry(body: &str) -> Entry {
        Entry {
            id: "feature-flags/index.mdx".into(),
            slug: Some("feature-flags".into()),
            body: Some(body.into()),
            collection: "post".into(),
            data: json!({}),
            digest: None,
            source: None,
        }
    }

    #[test]
    fn headings_get_anchor_ids() {
        let out = render_markdown("# Feature flags\n\nText.\n", &plugins(&[]));
        assert_eq!(out.html, "<h1 id=\"feature-flags\">Feature flags</h1>\n<p>Text.</p>\n");
        assert_eq!(
            out.headings,
            vec![Heading {
                depth: 1,
                slug: "feature-flags".into(),
                text: "Feature flags".into(),
            }]
        );
    }

    #[test]
    fn repeated_headings_are_deduplicated() {
        let out = render_markdown("## Setup\n\n## Setup\n\n### `cargo` usage\n", &plugins(&[]));
        let slugs: Vec<_> = out.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["setup", "setup-1", "cargo-usage"]);
        assert_eq!(out.headings[2].depth, 3);
        assert_eq!(out.headings[2].text, "cargo usage");
    }

    #[test]
    fn reading_time_rounds_up() {
        let body = "word ".repeat(201);
        let out = render_markdown(&body, &plugins(&[RemarkPlugin::ReadingTime]));
        assert_eq!(out.plugin_frontmatter["minutesRead"], json!("2 min read"));
    }

    #[test]
    fn reading_time_is_at_least_one_minute() {
        let out = render_markdown("Short.", &plugins(&[RemarkPlugin::ReadingTime]));
        assert_eq!(out.plugin_frontmatter["minutesRead"], json!("1 min read"));
    }

    #[test]
    fn no_plugins_no_frontmatter() {
        let out = render_markdown("Short.", &plugins(&[]));
        assert!(out.plugin_frontmatter.is_empty());
    }

    #[test]
    fn unwrap_images_removes_paragraph() {
        let md = "![Cover](cover.png)\n\nSome ![inline](a.png) text.\n";
        let out = render_markdown(md, &plugins(&[RemarkPlugin::UnwrapImages]));
        assert!(out.html.starts_with("<img src=\"cover.png\" alt=\"Cover\" />"));
        assert!(out.html.contains("<p>Some <img src=\"a.png\" alt=\"inline\" /> text.</p>"));
    }

    #[test]
    fn images_stay_wrapped_without_plugin() {
        let out = render_markdown("![Cover](cover.png)\n", &plugins(&[]));
        assert_eq!(out.html, "<p><img src=\"cover.png\" alt=\"Cover\" /></p>\n");
    }

    #[test]
    fn linked_image_is_unwrapped() {
        let md = "[![Cover](cover.png)](https://example.com)\n";
        let out = render_markdown(md, &plugins(&[RemarkPlugin::UnwrapImages]));
        assert!(!out.html.contains("<p>"));
        assert!(out.html.contains("<a href=\"https://example.com\">"));
    }

    #[test]
    fn render_entry_body() {
        let out = render(&content_entry("Hello *world*"), &plugins(&[])).unwrap();
        assert_eq!(out.html, "<p>Hello <em>world</em></p>\n");
    }

    #[test]
    fn data_entry_is_not_renderable() {
        let mut entry = content_entry("");
        entry.slug = None;
        entry.body = None;
        assert!(matches!(
            render(&entry, &plugins(&[])),
            Err(RenderError::NotRenderable { .. })
        ));
    }
}
