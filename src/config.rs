//! Project configuration module.
//!
//! Handles loading, validating, and merging `folio.toml`. User values are
//! merged on top of stock defaults, so the file only needs the keys it wants
//! to change.
//!
//! ## Config File Location
//!
//! ```text
//! blog/
//! ├── folio.toml               # Project config (overrides stock defaults)
//! └── src/content/             # content_dir
//!     ├── post/
//!     └── author/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! site = "https://blog.ldamore.com"   # Canonical site URL
//! content_dir = "src/content"         # Content root, relative to the project
//! compress_html = true
//! integrations = ["mdx", "tailwind", "sitemap", "prefetch", "react"]
//!
//! [markdown]
//! remark_plugins = ["unwrap-images", "reading-time"]
//!
//! [markdown.shiki]
//! theme = "dracula"
//! wrap = true
//!
//! [image]
//! service = "sharp"
//!
//! [meta]                              # Page head metadata
//! title = "Damo's Blog"
//! theme_color_light = "#fafafa"
//!
//! [profile.date]                      # How post dates are shown
//! locale = "en-US"
//! options = { day = "numeric", month = "short", year = "numeric" }
//!
//! [collections.author]
//! type = "data"
//!
//! [collections.post]
//! type = "content"
//! schema = { kind = "object", fields = { title = { kind = "string", max = 60 } } }
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::collection::{
    CollectionConfig, CollectionError, CollectionType, ContentConfig, define_collection,
};
use crate::schema::Schema;
use crate::site::{SiteMeta, SiteProfile, is_hex_color};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project config file.
pub const CONFIG_FILE: &str = "folio.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Collection config error: {0}")]
    Collection(#[from] CollectionError),
}

/// Project configuration loaded from `folio.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Canonical URL of the deployed site.
    pub site: String,
    /// Content root, relative to the project directory.
    pub content_dir: String,
    pub compress_html: bool,
    /// Framework integrations enabled for the site build.
    pub integrations: Vec<String>,
    pub markdown: MarkdownConfig,
    pub image: ImageConfig,
    pub meta: SiteMeta,
    pub profile: SiteProfile,
    pub collections: BTreeMap<String, CollectionDecl>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            site: "https://blog.ldamore.com".into(),
            content_dir: "src/content".into(),
            compress_html: true,
            integrations: ["mdx", "tailwind", "sitemap", "prefetch", "react"]
                .map(String::from)
                .to_vec(),
            markdown: MarkdownConfig::default(),
            image: ImageConfig::default(),
            meta: SiteMeta::default(),
            profile: SiteProfile::default(),
            collections: BTreeMap::new(),
        }
    }
}

impl ProjectConfig {
    /// Validate values that deserialization alone cannot check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.site.is_empty()
            && !(self.site.starts_with("https://") || self.site.starts_with("http://"))
        {
            return Err(ConfigError::Validation(format!(
                "site must be an http(s) URL, got '{}'",
                self.site
            )));
        }
        if self.content_dir.trim().is_empty() || Path::new(&self.content_dir).is_absolute() {
            return Err(ConfigError::Validation(
                "content_dir must be a non-empty relative path".into(),
            ));
        }
        if self.integrations.iter().any(|i| i.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "integrations must not contain empty names".into(),
            ));
        }
        for (i, plugin) in self.markdown.remark_plugins.iter().enumerate() {
            if self.markdown.remark_plugins[..i].contains(plugin) {
                return Err(ConfigError::Validation(format!(
                    "markdown.remark_plugins lists {} twice",
                    plugin.as_str()
                )));
            }
        }
        if self.markdown.shiki.theme.trim().is_empty() {
            return Err(ConfigError::Validation(
                "markdown.shiki.theme must not be empty".into(),
            ));
        }
        for (key, value) in [
            ("meta.theme_color_light", &self.meta.theme_color_light),
            ("meta.theme_color_dark", &self.meta.theme_color_dark),
        ] {
            if !is_hex_color(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a hex color like #fafafa, got '{value}'"
                )));
            }
        }
        if self.meta.lang.trim().is_empty() || self.profile.lang.trim().is_empty() {
            return Err(ConfigError::Validation("lang must not be empty".into()));
        }
        self.content_config()?.resolve()?;
        Ok(())
    }

    /// Absolute content root for a project at `project_root`.
    pub fn content_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.content_dir)
    }

    /// Collections declared under `[collections]`.
    pub fn content_config(&self) -> Result<ContentConfig, CollectionError> {
        let mut config = ContentConfig::new();
        for (name, decl) in &self.collections {
            let collection = CollectionConfig {
                kind: decl.kind,
                schema: None,
            };
            let collection = match &decl.schema {
                Some(schema) => collection.schema(schema.clone()),
                None => collection,
            };
            config.define(name.as_str(), define_collection(collection))?;
        }
        Ok(config)
    }
}

/// One `[collections.<name>]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionDecl {
    #[serde(rename = "type", default)]
    pub kind: CollectionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Markdown pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarkdownConfig {
    /// Plugins run in order after parsing.
    pub remark_plugins: Vec<RemarkPlugin>,
    pub shiki: ShikiConfig,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            remark_plugins: vec![RemarkPlugin::UnwrapImages, RemarkPlugin::ReadingTime],
            shiki: ShikiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RemarkPlugin {
    /// Adds `minutesRead` to the plugin front-matter.
    ReadingTime,
    /// Removes `<p>` around image-only paragraphs.
    UnwrapImages,
}

impl RemarkPlugin {
    pub fn as_str(self) -> &'static str {
        match self {
            RemarkPlugin::ReadingTime => "reading-time",
            RemarkPlugin::UnwrapImages => "unwrap-images",
        }
    }
}

/// Code block highlighting, passed through to the page templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShikiConfig {
    pub theme: String,
    pub wrap: bool,
}

impl Default for ShikiConfig {
    fn default() -> Self {
        Self {
            theme: "dracula".into(),
            wrap: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub service: ImageService,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageService {
    #[default]
    Sharp,
    Squoosh,
    Passthrough,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ProjectConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `folio.toml` from a project directory as a raw TOML value.
///
/// Returns `Ok(None)` if the project has no `folio.toml`.
pub fn load_raw_config(project_root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = project_root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ProjectConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the project config from `folio.toml` in `project_root`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(project_root: &Path) -> Result<ProjectConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(project_root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `folio.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# folio configuration
# ===================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Canonical URL of the deployed site.
site = "https://blog.ldamore.com"

# Content root, relative to this file. Each directory inside is a collection.
content_dir = "src/content"

# Minify the generated HTML pages.
compress_html = true

# Framework integrations enabled for the site build.
integrations = ["mdx", "tailwind", "sitemap", "prefetch", "react"]

# ---------------------------------------------------------------------------
# Markdown
# ---------------------------------------------------------------------------
[markdown]
# Run in order after parsing:
#   unwrap-images  removes <p> around paragraphs holding only images
#   reading-time   adds minutesRead ("3 min read") to the plugin front-matter
remark_plugins = ["unwrap-images", "reading-time"]

[markdown.shiki]
# Code block highlighting theme and soft-wrap.
theme = "dracula"
wrap = true

# ---------------------------------------------------------------------------
# Images
# ---------------------------------------------------------------------------
[image]
# Image service used by the site build: "sharp", "squoosh" or "passthrough".
service = "sharp"

# ---------------------------------------------------------------------------
# Page head metadata
# ---------------------------------------------------------------------------
[meta]
title = "Damo's Blog"
description = "A software developer blog"
lang = "en-US"
og_locale = "en_US"
github_url = "https://github.com/Lautarodamore/blog"
theme_color_light = "#fafafa"
theme_color_dark = "#1d1f21"

# ---------------------------------------------------------------------------
# Author profile
# ---------------------------------------------------------------------------
[profile]
author = "ldamore"
title = "Damo Blog"
description = "A software developer blog"
lang = "en-US"
og_locale = "en-US"

[profile.date]
# A locale or a preference list (first entry wins). en-US shows "Apr 1, 2023",
# other locales show "1 Apr 2023".
locale = "en-US"

[profile.date.options]
# day/year: "numeric" or "2-digit"; month: also "short", "long" or "narrow".
day = "numeric"
month = "short"
year = "numeric"

# ---------------------------------------------------------------------------
# Collections
# ---------------------------------------------------------------------------
# One table per directory under content_dir. type is "content" (Markdown/MDX)
# or "data" (JSON/YAML). Without a schema any front-matter is accepted.
#
# [collections.author]
# type = "data"
# schema = { kind = "object", fields = { name = { kind = "string" } } }
#
# [collections.post]
# type = "content"
#
# [collections.post.schema]
# kind = "object"
#
# [collections.post.schema.fields]
# title = { kind = "string", max = 60 }
# publishDate = { kind = "date" }
# tags = { kind = "default", value = [], inner = { kind = "array", items = { kind = "string" } } }
# author = { kind = "reference", collection = "author" }
"##
}
