//! Collection definitions.
//!
//! A collection is a named directory of entries that share a schema. Content
//! collections hold Markdown/MDX files (front-matter + body); data collections
//! hold JSON or YAML records.
//!
//! Collections are registered in a [`ContentConfig`], either declared in
//! `folio.toml` or built in code:
//!
//! ```rust
//! use folio::collection::{define_collection, CollectionConfig, ContentConfig};
//! use folio::schema::Schema;
//!
//! let mut config = ContentConfig::new();
//! config
//!     .define("author", define_collection(CollectionConfig::data()))
//!     .unwrap();
//! let author = config.reference("author").unwrap();
//! config
//!     .define(
//!         "post",
//!         define_collection(CollectionConfig::content().schema_with(move |ctx| {
//!             Schema::object([
//!                 ("title", Schema::string()),
//!                 ("cover", ctx.image().optional()),
//!                 ("author", author.clone()),
//!             ])
//!         })),
//!     )
//!     .unwrap();
//! ```
//!
//! Defining a collection never fails on the schema itself: a malformed schema
//! only shows up as validation failures once entries are loaded. The one
//! eager check is that every `reference` points at a registered collection,
//! which [`ContentConfig::resolve`] enforces before any entry is looked at.

use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Collection does not exist: {0}")]
    UnknownCollection(String),
    #[error("Collection '{collection}' references unknown collection '{target}'")]
    UnknownReference { collection: String, target: String },
    #[error("Invalid collection name '{0}': names must be non-empty, contain no '/', and not start with '_' or '.'")]
    InvalidName(String),
    #[error("Collection '{0}' is defined twice")]
    Duplicate(String),
}

/// Whether a collection is backed by Markdown files or structured data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    /// Markdown/MDX entries with front-matter, a slug, and a body.
    #[default]
    Content,
    /// JSON/YAML entries addressed by id.
    Data,
}

impl CollectionType {
    /// File extensions (lowercase, without dot) that hold entries of this type.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            CollectionType::Content => &["md", "mdx", "markdown"],
            CollectionType::Data => &["json", "yaml", "yml"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CollectionType::Content => "content",
            CollectionType::Data => "data",
        }
    }
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Helpers handed to schema functions.
#[derive(Debug, Default)]
pub struct SchemaContext {
    _private: (),
}

impl SchemaContext {
    /// Schema for an image path relative to the entry file.
    pub fn image(&self) -> Schema {
        Schema::image()
    }
}

type SchemaFn = dyn Fn(&SchemaContext) -> Schema + Send + Sync;

/// A collection's schema, fixed or built from a [`SchemaContext`].
#[derive(Clone)]
pub enum SchemaSource {
    Fixed(Schema),
    WithContext(Arc<SchemaFn>),
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Fixed(schema) => f.debug_tuple("Fixed").field(schema).finish(),
            SchemaSource::WithContext(_) => f.write_str("WithContext(..)"),
        }
    }
}

impl SchemaSource {
    fn build(&self) -> Schema {
        match self {
            SchemaSource::Fixed(schema) => schema.clone(),
            SchemaSource::WithContext(f) => f(&SchemaContext::default()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionConfig {
    pub kind: CollectionType,
    /// Without a schema, any data is accepted as-is.
    pub schema: Option<SchemaSource>,
}

impl CollectionConfig {
    pub fn content() -> Self {
        Self {
            kind: CollectionType::Content,
            schema: None,
        }
    }

    pub fn data() -> Self {
        Self {
            kind: CollectionType::Data,
            schema: None,
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(SchemaSource::Fixed(schema));
        self
    }

    pub fn schema_with<F>(mut self, build: F) -> Self
    where
        F: Fn(&SchemaContext) -> Schema + Send + Sync + 'static,
    {
        self.schema = Some(SchemaSource::WithContext(Arc::new(build)));
        self
    }

    fn resolved_schema(&self) -> Schema {
        self.schema
            .as_ref()
            .map(SchemaSource::build)
            .unwrap_or_else(Schema::any)
    }
}

/// Register a collection's type and schema. Returns the config unchanged.
pub fn define_collection(config: CollectionConfig) -> CollectionConfig {
    config
}

/// A collection with its schema built and its references checked.
#[derive(Debug, Clone)]
pub struct ResolvedCollection {
    pub kind: CollectionType,
    pub schema: Schema,
}

/// All collections of a project, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ContentConfig {
    collections: BTreeMap<String, CollectionConfig>,
}

impl ContentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(
        &mut self,
        name: impl Into<String>,
        config: CollectionConfig,
    ) -> Result<&mut Self, CollectionError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(CollectionError::InvalidName(name));
        }
        if self.collections.contains_key(&name) {
            return Err(CollectionError::Duplicate(name));
        }
        self.collections.insert(name, config);
        Ok(self)
    }

    /// Schema fragment pointing at an entry of `collection`.
    ///
    /// Fails right away if `collection` has not been defined yet.
    pub fn reference(&self, collection: &str) -> Result<Schema, CollectionError> {
        if self.collections.contains_key(collection) {
            Ok(Schema::reference(collection))
        } else {
            Err(CollectionError::UnknownCollection(collection.to_string()))
        }
    }

    pub fn get(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn types(&self) -> BTreeMap<String, CollectionType> {
        self.collections
            .iter()
            .map(|(name, config)| (name.clone(), config.kind))
            .collect()
    }

    /// Build every schema and check that all references name a defined collection.
    pub fn resolve(&self) -> Result<BTreeMap<String, ResolvedCollection>, CollectionError> {
        let mut resolved = BTreeMap::new();
        for (name, config) in &self.collections {
            let schema = config.resolved_schema();
            if let Some(target) = schema
                .referenced_collections()
                .into_iter()
                .find(|target| !self.collections.contains_key(*target))
            {
                return Err(CollectionError::UnknownReference {
                    collection: name.clone(),
                    target: target.to_string(),
                });
            }
            resolved.insert(
                name.clone(),
                ResolvedCollection {
                    kind: config.kind,
                    schema,
                },
            );
        }
        Ok(resolved)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.starts_with('_')
        && !name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_collection_is_identity() {
        let config = define_collection(CollectionConfig::data().schema(Schema::string()));
        assert_eq!(config.kind, CollectionType::Data);
        assert!(matches!(config.schema, Some(SchemaSource::Fixed(Schema::String { .. }))));
    }

    #[test]
    fn default_collection_type_is_content() {
        assert_eq!(CollectionConfig::default().kind, CollectionType::Content);
    }

    #[test]
    fn reference_to_defined_collection() {
        let mut config = ContentConfig::new();
        config.define("author", CollectionConfig::data()).unwrap();
        assert!(matches!(
            config.reference("author"),
            Ok(Schema::Reference { collection }) if collection == "author"
        ));
    }

    #[test]
    fn reference_to_unknown_collection_fails_eagerly() {
        let config = ContentConfig::new();
        assert_eq!(
            config.reference("author").unwrap_err(),
            CollectionError::UnknownCollection("author".into())
        );
    }

    #[test]
    fn resolve_rejects_unknown_reference_without_any_entries() {
        let mut config = ContentConfig::new();
        config
            .define(
                "post",
                CollectionConfig::content()
                    .schema(Schema::object([("author", Schema::reference("people"))])),
            )
            .unwrap();

        assert_eq!(
            config.resolve().unwrap_err(),
            CollectionError::UnknownReference {
                collection: "post".into(),
                target: "people".into(),
            }
        );
    }

    #[test]
    fn resolve_builds_context_schemas() {
        let mut config = ContentConfig::new();
        config
            .define(
                "post",
                CollectionConfig::content()
                    .schema_with(|ctx| Schema::object([("cover", ctx.image())])),
            )
            .unwrap();

        let resolved = config.resolve().unwrap();
        let Schema::Object { fields, .. } = &resolved["post"].schema else {
            panic!("expected object schema");
        };
        assert!(matches!(fields["cover"], Schema::Image));
    }

    #[test]
    fn missing_schema_accepts_anything() {
        let mut config = ContentConfig::new();
        config.define("notes", CollectionConfig::content()).unwrap();
        assert!(matches!(config.resolve().unwrap()["notes"].schema, Schema::Any));
    }

    #[test]
    fn invalid_and_duplicate_names_rejected() {
        let mut config = ContentConfig::new();
        for bad in ["", "_drafts", ".hidden", "a/b"] {
            assert_eq!(
                config.define(bad, CollectionConfig::content()).unwrap_err(),
                CollectionError::InvalidName(bad.into())
            );
        }
        config.define("post", CollectionConfig::content()).unwrap();
        assert_eq!(
            config.define("post", CollectionConfig::data()).unwrap_err(),
            CollectionError::Duplicate("post".into())
        );
    }

    #[test]
    fn types_map_follows_definitions() {
        let mut config = ContentConfig::new();
        config
            .define("post", CollectionConfig::content())
            .unwrap()
            .define("author", CollectionConfig::data())
            .unwrap();
        let types = config.types();
        assert_eq!(types["post"], CollectionType::Content);
        assert_eq!(types["author"], CollectionType::Data);
        assert_eq!(config.names().collect::<Vec<_>>(), vec!["author", "post"]);
    }
}
