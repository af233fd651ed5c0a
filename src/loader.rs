//! Content discovery: from a content directory on disk to a [`Registry`].
//!
//! ## Directory Structure
//!
//! ```text
//! src/content/                         # Content root (`content_dir`)
//! ├── post/                            # Content collection
//! │   ├── feature-flags/
//! │   │   ├── index.mdx                # id: feature-flags/index.mdx, slug: feature-flags
//! │   │   └── cover.svg                # Referenced from front-matter, not an entry
//! │   ├── ci-with-dagger.md            # id: ci-with-dagger.md, slug: ci-with-dagger
//! │   └── _template.mdx                # Ignored (leading underscore)
//! └── author/                          # Data collection
//!     ├── ldamore.json                 # id: ldamore
//!     └── guest.yaml                   # id: guest
//! ```
//!
//! ## Rules
//!
//! - Each directory directly under the content root is a collection. Directories
//!   that are not defined in the config are skipped with a warning.
//! - Files and directories whose name starts with `_` or `.` are ignored.
//! - Files are visited in file-name order, depth first, so discovery order
//!   is the same on every platform.
//! - A collection directory cannot hold both Markdown and data files.
//! - Files with other extensions (images, notes) are left alone.

use crate::collection::{CollectionType, ContentConfig};
use crate::entry::RawEntry;
use crate::registry::{Registry, RegistryError};
use crate::slug::strip_extension;
use gray_matter::{Matter, engine::YAML};
use rayon::prelude::*;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Invalid front-matter in {path}: {message}")]
    FrontMatter { path: PathBuf, message: String },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("Collection directory contains both content and data files: {0}")]
    MixedContent(PathBuf),
    #[error("{path} is not a {expected} entry")]
    WrongEntryType {
        path: PathBuf,
        expected: CollectionType,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A file that belongs to a collection, before it is read.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    collection: String,
    kind: CollectionType,
    path: PathBuf,
    /// Path relative to the collection directory, `/` separated.
    relative: String,
}

/// Discover, read, and validate every entry under `content_root`.
///
/// Resolved image `src` values are relative to `project_root`.
pub fn load(project_root: &Path, content_root: &Path, config: &ContentConfig) -> Result<Registry, LoadError> {
    let entries = discover(content_root, config)?;
    Ok(Registry::build_in(Some(project_root), config, entries)?)
}

/// Read every entry under `content_root` without validating it.
pub fn discover(content_root: &Path, config: &ContentConfig) -> Result<Vec<RawEntry>, LoadError> {
    let candidates = collect_candidates(content_root, config)?;
    debug!(files = candidates.len(), "reading entries");
    candidates.par_iter().map(read_entry).collect()
}

fn collect_candidates(content_root: &Path, config: &ContentConfig) -> Result<Vec<Candidate>, LoadError> {
    if !content_root.is_dir() {
        warn!(path = %content_root.display(), "content directory does not exist");
        return Ok(Vec::new());
    }

    let mut dirs = fs::read_dir(content_root)?
        .map(|e| e.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    dirs.retain(|p| p.is_dir() && !is_ignored(p));
    dirs.sort();

    let mut candidates = Vec::new();
    for dir in dirs {
        let name = file_name(&dir);
        let Some(collection) = config.get(&name) else {
            warn!(collection = %name, "directory has no collection definition, skipping");
            continue;
        };
        candidates.extend(scan_collection(&dir, &name, collection.kind)?);
    }
    Ok(candidates)
}

fn scan_collection(dir: &Path, name: &str, kind: CollectionType) -> Result<Vec<Candidate>, LoadError> {
    let mut candidates = Vec::new();
    let mut seen_content = false;
    let mut seen_data = false;

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored(e.path()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(file_kind) = entry_type(path) else {
            debug!(path = %path.display(), "not an entry file, skipping");
            continue;
        };
        match file_kind {
            CollectionType::Content => seen_content = true,
            CollectionType::Data => seen_data = true,
        }
        if seen_content && seen_data {
            return Err(LoadError::MixedContent(dir.to_path_buf()));
        }
        if file_kind != kind {
            return Err(LoadError::WrongEntryType {
                path: path.to_path_buf(),
                expected: kind,
            });
        }

        let relative = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        candidates.push(Candidate {
            collection: name.to_string(),
            kind,
            path: path.to_path_buf(),
            relative,
        });
    }
    Ok(candidates)
}

fn read_entry(candidate: &Candidate) -> Result<RawEntry, LoadError> {
    let text = fs::read_to_string(&candidate.path)?;
    let digest = format!("{:x}", Sha256::digest(text.as_bytes()));

    let (id, data, body) = match candidate.kind {
        CollectionType::Content => {
            let (data, body) = parse_front_matter(&text, &candidate.path)?;
            (candidate.relative.clone(), data, Some(body))
        }
        CollectionType::Data => {
            let data = parse_data_file(&text, &candidate.path)?;
            (strip_extension(&candidate.relative).to_string(), data, None)
        }
    };
    debug!(collection = %candidate.collection, id = %id, "entry read");

    Ok(RawEntry {
        collection: candidate.collection.clone(),
        id,
        body,
        data,
        source: Some(candidate.path.clone()),
        digest: Some(digest),
    })
}

/// Split a Markdown file into its YAML front-matter and body.
///
/// A file without front-matter has empty data.
pub fn parse_front_matter(text: &str, path: &Path) -> Result<(Value, String), LoadError> {
    let invalid = |message: String| LoadError::FrontMatter {
        path: path.to_path_buf(),
        message,
    };
    let parsed = Matter::<YAML>::new()
        .parse::<Value>(text)
        .map_err(|e| invalid(e.to_string()))?;
    let data = match parsed.matter.trim() {
        "" => Value::Null,
        matter => serde_yaml::from_str(matter).map_err(|e| invalid(e.to_string()))?,
    };
    Ok((non_null(data), parsed.content))
}

fn parse_data_file(text: &str, path: &Path) -> Result<Value, LoadError> {
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        return serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        });
    }
    let data: Value = serde_yaml::from_str(text).map_err(|source| LoadError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(non_null(data))
}

/// An empty document is an empty record.
fn non_null(data: Value) -> Value {
    match data {
        Value::Null => Value::Object(Map::new()),
        data => data,
    }
}

/// Entry type of a file by extension, or `None` if it is not an entry.
fn entry_type(path: &Path) -> Option<CollectionType> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    [CollectionType::Content, CollectionType::Data]
        .into_iter()
        .find(|kind| kind.extensions().contains(&ext.as_str()))
}

fn is_ignored(path: &Path) -> bool {
    let name = file_name(path);
    name.starts_with('_') || name.starts_with('.')
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionConfig;
    use crate::schema::Schema;
    use crate::test_helpers::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn config() -> ContentConfig {
        let mut config = ContentConfig::new();
        config
            .define("post", CollectionConfig::content())
            .unwrap()
            .define("author", CollectionConfig::data())
            .unwrap();
        config
    }

    fn ids(entries: &[RawEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn content_ids_keep_extension_and_nesting() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/feature-flags/index.mdx", "---\ntitle: Flags\n---\nBody\n");
        write_file(tmp.path(), "post/a-first.md", "---\ntitle: A\n---\n");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(ids(&entries), vec!["a-first.md", "feature-flags/index.mdx"]);
        assert_eq!(entries[1].collection, "post");
        assert_eq!(entries[1].data, json!({"title": "Flags"}));
        assert_eq!(entries[1].body.as_deref().map(str::trim), Some("Body"));
    }

    #[test]
    fn data_ids_drop_extension() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/ldamore.json", r#"{"name": "Lorenzo"}"#);
        write_file(tmp.path(), "author/guest.yaml", "name: Guest\nsocial:\n  - mastodon\n");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(ids(&entries), vec!["guest", "ldamore"]);
        assert_eq!(entries[0].data, json!({"name": "Guest", "social": ["mastodon"]}));
        assert_eq!(entries[1].data, json!({"name": "Lorenzo"}));
        assert!(entries.iter().all(|e| e.body.is_none()));
    }

    #[test]
    fn underscore_and_dot_files_ignored() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/_template.mdx", "---\ntitle: T\n---\n");
        write_file(tmp.path(), "post/_drafts/wip.md", "---\ntitle: W\n---\n");
        write_file(tmp.path(), "post/.hidden.md", "---\ntitle: H\n---\n");
        write_file(tmp.path(), "post/real.md", "---\ntitle: R\n---\n");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(ids(&entries), vec!["real.md"]);
    }

    #[test]
    fn non_entry_files_skipped() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/flags/index.md", "---\ntitle: F\n---\n");
        write_file(tmp.path(), "post/flags/cover.svg", "<svg/>");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(ids(&entries), vec!["flags/index.md"]);
    }

    #[test]
    fn undefined_collection_directory_skipped() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "notes/a.md", "---\ntitle: A\n---\n");

        assert!(discover(tmp.path(), &config()).unwrap().is_empty());
    }

    #[test]
    fn missing_content_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(discover(&tmp.path().join("nope"), &config()).unwrap().is_empty());
    }

    #[test]
    fn mixed_content_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/a.md", "---\ntitle: A\n---\n");
        write_file(tmp.path(), "post/b.json", "{}");

        let result = discover(tmp.path(), &config());
        assert!(matches!(result, Err(LoadError::MixedContent(_))));
    }

    #[test]
    fn wrong_entry_type_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/ldamore.md", "---\nname: L\n---\n");

        let result = discover(tmp.path(), &config());
        assert!(matches!(
            result,
            Err(LoadError::WrongEntryType { expected: CollectionType::Data, .. })
        ));
    }

    #[test]
    fn invalid_json_reports_path() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/broken.json", "{ not json");

        let err = discover(tmp.path(), &config()).unwrap_err();
        assert!(matches!(&err, LoadError::Json { path, .. } if path.ends_with("broken.json")));
    }

    #[test]
    fn yaml_data_with_document_marker() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/guest.yaml", "---\nname: Guest\n");
        write_file(tmp.path(), "author/ldamore.yml", "---\nname: Lautaro\n...\n");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(entries[0].data, json!({"name": "Guest"}));
        assert_eq!(entries[1].data, json!({"name": "Lautaro"}));
    }

    #[test]
    fn yaml_data_top_level_list() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/team.yaml", "- ldamore\n- guest\n");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(entries[0].id, "team");
        assert_eq!(entries[0].data, json!(["ldamore", "guest"]));
    }

    #[test]
    fn empty_yaml_data_is_empty_object() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/blank.yaml", "");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(entries[0].data, json!({}));
    }

    #[test]
    fn invalid_yaml_data_reports_path() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/broken.yaml", "name: [unclosed\n");

        let err = discover(tmp.path(), &config()).unwrap_err();
        assert!(matches!(&err, LoadError::Yaml { path, .. } if path.ends_with("broken.yaml")));
    }

    #[test]
    fn invalid_front_matter_reports_path() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/broken.md", "---\ntitle: [unclosed\n---\nBody\n");

        let err = discover(tmp.path(), &config()).unwrap_err();
        assert!(matches!(&err, LoadError::FrontMatter { path, .. } if path.ends_with("broken.md")));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_collection_directory_is_error() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/a.md", "---\ntitle: A\n---\n");
        let post = tmp.path().join("post");
        fs::set_permissions(&post, fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits do not apply when running as root.
        let refused = fs::read_dir(&post).is_err();

        let result = discover(tmp.path(), &config());
        fs::set_permissions(&post, fs::Permissions::from_mode(0o755)).unwrap();
        if refused {
            assert!(matches!(result, Err(LoadError::Walk(_))));
        }
    }

    #[test]
    fn markdown_without_front_matter_has_empty_data() {
        let (data, body) = parse_front_matter("# Just a body\n", Path::new("x.md")).unwrap();
        assert_eq!(data, json!({}));
        assert_eq!(body.trim(), "# Just a body");
    }

    #[test]
    fn digest_is_sha256_of_source() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "author/a.json", "{}");

        let entries = discover(tmp.path(), &config()).unwrap();
        assert_eq!(
            entries[0].digest.as_deref(),
            Some("44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a")
        );
    }

    #[test]
    fn load_validates_fixture_blog() {
        let tmp = setup_fixtures();
        let registry = load_fixture_registry(tmp.path());

        let entry = find_entry(&registry, "post", "feature-flags");
        assert_eq!(entry.id, "feature-flags/index.mdx");
        assert_eq!(
            collection_slugs(&registry, "post"),
            vec!["ci-with-dagger", "feature-flags", "publish-npm-package"]
        );
        assert_eq!(collection_slugs(&registry, "author"), vec!["guest", "ldamore"]);
        assert_eq!(entry.data["coverImage"]["src"]["src"], "src/content/post/feature-flags/cover.svg");
    }

    #[test]
    fn load_fails_on_invalid_front_matter_data() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "post/a.md", "---\ntitle: 3\n---\n");
        let mut config = ContentConfig::new();
        config
            .define(
                "post",
                CollectionConfig::content().schema(Schema::object([("title", Schema::string())])),
            )
            .unwrap();

        let result = load(tmp.path(), tmp.path(), &config);
        assert!(matches!(
            result,
            Err(LoadError::Registry(RegistryError::SchemaValidation { .. }))
        ));
    }
}
