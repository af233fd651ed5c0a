//! Entries and references to them.
//!
//! An [`Entry`] is one validated file of a collection. A [`Reference`] names
//! an entry without resolving it: `{collection, slug}` for content targets,
//! `{collection, id}` for data targets. It is the same shape the `reference`
//! schema kind writes into an entry's data, so a reference field can be
//! turned back into a lookup with [`Reference::from_value`].

use crate::collection::CollectionType;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// How a reference addresses its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKey {
    Slug(String),
    Id(String),
}

impl EntryKey {
    pub fn as_str(&self) -> &str {
        match self {
            EntryKey::Slug(s) | EntryKey::Id(s) => s,
        }
    }

    /// The collection type this key can address.
    pub fn collection_type(&self) -> CollectionType {
        match self {
            EntryKey::Slug(_) => CollectionType::Content,
            EntryKey::Id(_) => CollectionType::Data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub collection: String,
    #[serde(flatten)]
    pub key: EntryKey,
}

impl Reference {
    pub fn slug(collection: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: EntryKey::Slug(slug.into()),
        }
    }

    pub fn id(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: EntryKey::Id(id.into()),
        }
    }

    /// Read a reference out of validated entry data.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            EntryKey::Slug(slug) => write!(f, "{} → slug '{}'", self.collection, slug),
            EntryKey::Id(id) => write!(f, "{} → id '{}'", self.collection, id),
        }
    }
}

/// A file found on disk, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEntry {
    pub collection: String,
    /// Path relative to the collection directory, `/` separated.
    pub id: String,
    /// Body after front-matter; `None` for data files.
    pub body: Option<String>,
    /// Front-matter or data file contents, not yet validated.
    pub data: Value,
    pub source: Option<PathBuf>,
    /// Hex SHA-256 of the source file.
    pub digest: Option<String>,
}

impl RawEntry {
    /// An in-memory content entry, for building a registry without a content directory.
    pub fn content(
        collection: impl Into<String>,
        id: impl Into<String>,
        data: Value,
        body: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            body: Some(body.into()),
            data,
            source: None,
            digest: None,
        }
    }

    /// An in-memory data entry.
    pub fn data(collection: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            body: None,
            data,
            source: None,
            digest: None,
        }
    }
}

/// A validated entry of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub collection: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Entry {
    pub fn kind(&self) -> CollectionType {
        if self.slug.is_some() {
            CollectionType::Content
        } else {
            CollectionType::Data
        }
    }

    /// A reference that resolves back to this entry.
    pub fn reference(&self) -> Reference {
        match &self.slug {
            Some(slug) => Reference::slug(&self.collection, slug),
            None => Reference::id(&self.collection, &self.id),
        }
    }

    /// Deserialize the validated data into a typed struct.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Title from the data, if the schema has one.
    pub fn title(&self) -> Option<&str> {
        self.data.get("title").and_then(Value::as_str)
    }
}
