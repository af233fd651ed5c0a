//! GitHub-style slugs for entry ids and heading anchors.
//!
//! The same rules apply to both:
//! - lower-case everything,
//! - drop punctuation except `-` and `_`,
//! - turn every space into `-` (runs are not collapsed).
//!
//! Entry slugs apply this per path segment of the id after removing the file
//! extension, and drop a trailing `index` segment:
//! - `feature-flags/index.mdx` → `feature-flags`
//! - `2023/Hello World.md` → `2023/hello-world`
//! - `index.md` → `index`

use std::collections::HashMap;

/// Slug of a single piece of text.
pub fn github_slug(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

/// Default slug of a content entry, derived from its id.
pub fn slug_from_id(id: &str) -> String {
    let without_ext = strip_extension(id);
    let slug = without_ext
        .split('/')
        .map(github_slug)
        .collect::<Vec<_>>()
        .join("/");
    match slug.strip_suffix("/index") {
        Some(parent) => parent.to_string(),
        None => slug,
    }
}

/// Drop the extension of the last path segment, if it has one.
pub fn strip_extension(id: &str) -> &str {
    let start = id.rfind('/').map_or(0, |i| i + 1);
    match id[start..].rfind('.') {
        Some(dot) if dot > 0 => &id[..start + dot],
        _ => id,
    }
}

/// Hands out unique heading slugs within one document.
///
/// A repeated heading gets `-1`, `-2`, ... appended, matching what GitHub
/// does for anchors.
#[derive(Debug, Default)]
pub struct Slugger {
    seen: HashMap<String, usize>,
}

impl Slugger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slug(&mut self, text: &str) -> String {
        let base = github_slug(text);
        let mut slug = base.clone();
        while let Some(count) = self.seen.get_mut(&slug) {
            *count += 1;
            slug = format!("{base}-{count}");
        }
        self.seen.insert(slug.clone(), 0);
        slug
    }
}
