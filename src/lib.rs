//! # folio
//!
//! The content layer of a Markdown blog. Collections of posts and data
//! records live on disk; folio validates every entry against its collection's
//! schema and hands page templates an immutable, typed registry to query.
//!
//! # Architecture: Load Once, Read Many
//!
//! ```text
//! 1. Config    folio.toml   →  ProjectConfig + ContentConfig   (collections, schemas)
//! 2. Discover  src/content/ →  Vec<RawEntry>                   (front-matter + body)
//! 3. Validate  raw entries  →  Registry                        (fail fast on any bad entry)
//! 4. Query     Registry     →  &Entry                          (get_collection, get_entry, ...)
//! ```
//!
//! A registry only exists if every entry passed validation, so page code never
//! sees half-valid data. After the build it is read-only and `Send + Sync`.
//!
//! ```rust,no_run
//! use folio::{config, loader};
//! use std::path::Path;
//!
//! let root = Path::new("blog");
//! let project = config::load_config(root)?;
//! let registry = loader::load(root, &project.content_root(root), &project.content_config()?)?;
//!
//! let published = registry.get_collection_filtered("post", |e| e.data["draft"] != true)?;
//! let post = registry.get_entry_by_slug("post", "feature-flags")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`collection`] | `define_collection`, `ContentConfig`, eager `reference` checks |
//! | [`schema`] | Schema kinds (object, union, date, image, reference, ...) and the validator |
//! | [`entry`] | `Entry`, `RawEntry`, and `Reference` values |
//! | [`registry`] | The validated registry and its lookup operations |
//! | [`loader`] | Walks the content directory and parses front-matter and data files |
//! | [`slug`] | GitHub-style slugs for entry ids and heading anchors |
//! | [`render`] | Markdown body → HTML, headings, and remark plugin front-matter |
//! | [`site`] | `SiteMeta` and `SiteProfile` records, post date formatting |
//! | [`config`] | `folio.toml` loading, merging onto stock defaults, and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Soft Misses Are Not Errors
//!
//! Looking up a slug or id that does not exist returns `Ok(None)`. Pages that
//! link to optional content can branch on it. [`registry::Registry::require_entry`]
//! and [`registry::Registry::get_entries`] are the strict forms and fail with
//! `EntryNotFound`.
//!
//! ## References Resolve Lazily
//!
//! A `reference` field is validated into `{collection, slug}` or
//! `{collection, id}` but not looked up. The collection name is checked when
//! the config is assembled; the target entry is only checked when someone
//! resolves it.

pub mod collection;
pub mod config;
pub mod entry;
pub mod loader;
pub mod output;
pub mod registry;
pub mod render;
pub mod schema;
pub mod site;
pub mod slug;

#[cfg(test)]
pub(crate) mod test_helpers;
