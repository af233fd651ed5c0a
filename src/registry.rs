//! The content registry: every collection's validated entries, plus lookups.
//!
//! A [`Registry`] is built once from a [`ContentConfig`] and the raw entries
//! found on disk (see [`crate::loader`]). Building validates every entry
//! against its collection's schema and fails on the first invalid entry, so a
//! registry that exists is fully valid. After that it is immutable and can be
//! shared across threads without locking.
//!
//! ## Lookups
//!
//! | operation | miss | wrong collection type |
//! |-----------|------|-----------------------|
//! | [`Registry::get_collection`] | n/a | n/a |
//! | [`Registry::get_entry`] | `Ok(None)` | `CollectionTypeMismatch` |
//! | [`Registry::get_entry_by_slug`] | `Ok(None)` | `CollectionTypeMismatch` |
//! | [`Registry::get_data_entry_by_id`] | `Ok(None)` | `CollectionTypeMismatch` |
//! | [`Registry::require_entry`] | `EntryNotFound` | `CollectionTypeMismatch` |
//! | [`Registry::get_entries`] | `EntryNotFound` | `CollectionTypeMismatch` |
//!
//! Every operation fails with `UnknownCollection` when the collection name
//! is not registered.

use crate::collection::{CollectionError, CollectionType, ContentConfig, ResolvedCollection};
use crate::entry::{Entry, EntryKey, RawEntry, Reference};
use crate::schema::{Issue, ParseContext, PathSegment, ValidationError};
use crate::slug::slug_from_id;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error("Collection does not exist: {0}")]
    UnknownCollection(String),
    #[error("{collection} → {id} data does not match collection schema: {source}")]
    SchemaValidation {
        collection: String,
        id: String,
        #[source]
        source: ValidationError,
    },
    #[error("Entry not found: {0}")]
    EntryNotFound(Reference),
    #[error("Collection '{collection}' is a {actual} collection, expected a {expected} collection")]
    CollectionTypeMismatch {
        collection: String,
        expected: CollectionType,
        actual: CollectionType,
    },
    #[error("Duplicate id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },
    #[error("Duplicate slug '{slug}' in collection '{collection}': used by {first} and {second}")]
    DuplicateSlug {
        collection: String,
        slug: String,
        first: String,
        second: String,
    },
}

#[derive(Debug)]
struct Collection {
    kind: CollectionType,
    entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
    by_slug: HashMap<String, usize>,
}

impl Collection {
    fn new(kind: CollectionType) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_slug: HashMap::new(),
        }
    }

    fn push(&mut self, collection: &str, entry: Entry) -> Result<(), RegistryError> {
        let index = self.entries.len();
        if self.by_id.insert(entry.id.clone(), index).is_some() {
            return Err(RegistryError::DuplicateId {
                collection: collection.to_string(),
                id: entry.id,
            });
        }
        if let Some(slug) = &entry.slug {
            if let Some(&first) = self.by_slug.get(slug) {
                return Err(RegistryError::DuplicateSlug {
                    collection: collection.to_string(),
                    slug: slug.clone(),
                    first: self.entries[first].id.clone(),
                    second: entry.id.clone(),
                });
            }
            self.by_slug.insert(slug.clone(), index);
        }
        self.entries.push(entry);
        Ok(())
    }
}

/// Immutable map from collection name to its validated entries.
#[derive(Debug)]
pub struct Registry {
    collections: BTreeMap<String, Collection>,
}

impl Registry {
    /// Validate `entries` against `config` and index them.
    ///
    /// Entries keep the order they are given in. Image paths in front-matter
    /// resolve against each entry's source directory.
    pub fn build(config: &ContentConfig, entries: Vec<RawEntry>) -> Result<Self, RegistryError> {
        Self::build_in(None, config, entries)
    }

    /// Like [`Registry::build`], with resolved image `src` values made relative to `root`.
    pub fn build_in(
        root: Option<&Path>,
        config: &ContentConfig,
        entries: Vec<RawEntry>,
    ) -> Result<Self, RegistryError> {
        let resolved = config.resolve()?;
        let types = config.types();

        for raw in &entries {
            if !resolved.contains_key(&raw.collection) {
                return Err(RegistryError::UnknownCollection(raw.collection.clone()));
            }
        }

        let validated: Vec<Entry> = entries
            .into_par_iter()
            .map(|raw| {
                let collection = &resolved[&raw.collection];
                validate_entry(raw, collection, &types, root)
            })
            .collect::<Result<_, _>>()?;

        let mut collections: BTreeMap<String, Collection> = resolved
            .iter()
            .map(|(name, c)| (name.clone(), Collection::new(c.kind)))
            .collect();
        for entry in validated {
            debug!(collection = %entry.collection, id = %entry.id, "entry validated");
            let name = entry.collection.clone();
            if let Some(collection) = collections.get_mut(&name) {
                collection.push(&name, entry)?;
            }
        }
        for (name, collection) in &collections {
            info!(
                collection = %name,
                kind = %collection.kind,
                entries = collection.entries.len(),
                "collection loaded"
            );
        }

        Ok(Self { collections })
    }

    /// Registered collection names, sorted.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn collection_type(&self, name: &str) -> Result<CollectionType, RegistryError> {
        self.collection(name).map(|c| c.kind)
    }

    /// Total number of entries across all collections.
    pub fn entry_count(&self) -> usize {
        self.collections.values().map(|c| c.entries.len()).sum()
    }

    /// All entries of `name`, in discovery order.
    pub fn get_collection(&self, name: &str) -> Result<&[Entry], RegistryError> {
        self.collection(name).map(|c| c.entries.as_slice())
    }

    /// Entries of `name` for which `keep` returns true, in discovery order.
    pub fn get_collection_filtered<F>(&self, name: &str, mut keep: F) -> Result<Vec<&Entry>, RegistryError>
    where
        F: FnMut(&Entry) -> bool,
    {
        Ok(self
            .get_collection(name)?
            .iter()
            .filter(|entry| keep(entry))
            .collect())
    }

    /// Resolve `reference`. A missing entry is `Ok(None)`.
    pub fn get_entry(&self, reference: &Reference) -> Result<Option<&Entry>, RegistryError> {
        let collection = self.collection(&reference.collection)?;
        let expected = reference.key.collection_type();
        if collection.kind != expected {
            return Err(RegistryError::CollectionTypeMismatch {
                collection: reference.collection.clone(),
                expected,
                actual: collection.kind,
            });
        }
        let index = match &reference.key {
            EntryKey::Slug(slug) => collection.by_slug.get(slug),
            EntryKey::Id(id) => collection.by_id.get(id),
        };
        Ok(index.map(|&i| &collection.entries[i]))
    }

    pub fn get_entry_by_slug(&self, collection: &str, slug: &str) -> Result<Option<&Entry>, RegistryError> {
        self.get_entry(&Reference::slug(collection, slug))
    }

    pub fn get_data_entry_by_id(&self, collection: &str, id: &str) -> Result<Option<&Entry>, RegistryError> {
        self.get_entry(&Reference::id(collection, id))
    }

    /// Resolve `reference`, treating a miss as an error.
    pub fn require_entry(&self, reference: &Reference) -> Result<&Entry, RegistryError> {
        self.get_entry(reference)?
            .ok_or_else(|| RegistryError::EntryNotFound(reference.clone()))
    }

    /// Resolve every reference in order. Fails on the first one that does not resolve.
    pub fn get_entries(&self, references: &[Reference]) -> Result<Vec<&Entry>, RegistryError> {
        references.iter().map(|r| self.require_entry(r)).collect()
    }

    /// Serializable description of every collection and entry.
    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            collections: self
                .collections
                .iter()
                .map(|(name, collection)| {
                    let entries = collection
                        .entries
                        .iter()
                        .map(|entry| ManifestEntry {
                            id: &entry.id,
                            slug: entry.slug.as_deref(),
                            digest: entry.digest.as_deref(),
                            data: &entry.data,
                        })
                        .collect();
                    (
                        name.as_str(),
                        ManifestCollection {
                            kind: collection.kind,
                            entries,
                        },
                    )
                })
                .collect(),
        }
    }

    fn collection(&self, name: &str) -> Result<&Collection, RegistryError> {
        self.collections
            .get(name)
            .ok_or_else(|| RegistryError::UnknownCollection(name.to_string()))
    }
}

/// Written to `.folio/manifest.json` by `folio sync`.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub collections: BTreeMap<&'a str, ManifestCollection<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ManifestCollection<'a> {
    #[serde(rename = "type")]
    pub kind: CollectionType,
    pub entries: Vec<ManifestEntry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct ManifestEntry<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<&'a str>,
    pub data: &'a Value,
}

/// Turn a raw entry into a validated one: pull out the slug, then validate data.
fn validate_entry(
    raw: RawEntry,
    collection: &ResolvedCollection,
    types: &BTreeMap<String, CollectionType>,
    root: Option<&Path>,
) -> Result<Entry, RegistryError> {
    let RawEntry {
        collection: name,
        id,
        body,
        mut data,
        source,
        digest,
    } = raw;
    let schema_error = |source: ValidationError| RegistryError::SchemaValidation {
        collection: name.clone(),
        id: id.clone(),
        source,
    };

    let slug = match collection.kind {
        CollectionType::Content => Some(match take_slug(&mut data) {
            Ok(Some(slug)) => slug,
            Ok(None) => slug_from_id(&id),
            Err(e) => return Err(schema_error(e)),
        }),
        CollectionType::Data => None,
    };

    let mut ctx = ParseContext::new(types);
    ctx.entry_dir = source.as_deref().and_then(Path::parent);
    ctx.root = root;
    let data = collection
        .schema
        .validate(&data, &ctx)
        .map_err(schema_error)?;

    Ok(Entry {
        id,
        slug,
        body: match collection.kind {
            CollectionType::Content => Some(body.unwrap_or_default()),
            CollectionType::Data => None,
        },
        collection: name,
        data,
        digest,
        source,
    })
}

/// Remove a front-matter `slug` override from `data`.
fn take_slug(data: &mut Value) -> Result<Option<String>, ValidationError> {
    let Some(obj) = data.as_object_mut() else {
        return Ok(None);
    };
    match obj.remove("slug") {
        None => Ok(None),
        Some(Value::String(slug)) => Ok(Some(slug)),
        Some(_) => Err(ValidationError {
            issues: vec![Issue {
                path: vec![PathSegment::Key("slug".into())],
                message: "Expected string for slug override".into(),
            }],
        }),
    }
}
