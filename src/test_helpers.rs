//! Shared test utilities for the folio test suite.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let registry = load_fixture_registry(tmp.path());
//!
//! let post = find_entry(&registry, "post", "feature-flags");
//! assert_eq!(post.id, "feature-flags/index.mdx");
//! assert_eq!(collection_slugs(&registry, "author"), vec!["guest", "ldamore"]);
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::entry::Entry;
use crate::registry::Registry;
use crate::{config, loader};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/blog/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/blog");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Load `folio.toml` from `root` and build the registry. Panics on any error.
pub fn load_fixture_registry(root: &Path) -> Registry {
    let project = config::load_config(root).unwrap();
    let content = project.content_config().unwrap();
    loader::load(root, &project.content_root(root), &content)
        .unwrap_or_else(|e| panic!("fixture blog failed to load: {e}"))
}

// =========================================================================
// Registry lookups: panic with a clear message on miss
// =========================================================================

/// Find a content entry by slug or a data entry by id. Panics if not found.
pub fn find_entry<'a>(registry: &'a Registry, collection: &str, key: &str) -> &'a Entry {
    registry
        .get_collection(collection)
        .unwrap()
        .iter()
        .find(|e| e.slug.as_deref().unwrap_or(&e.id) == key)
        .unwrap_or_else(|| {
            let keys = collection_slugs(registry, collection);
            panic!("entry '{key}' not found in '{collection}'. Available: {keys:?}")
        })
}

/// Slugs (content) or ids (data) of a collection, in registry order.
pub fn collection_slugs<'a>(registry: &'a Registry, collection: &str) -> Vec<&'a str> {
    registry
        .get_collection(collection)
        .unwrap()
        .iter()
        .map(|e| e.slug.as_deref().unwrap_or(&e.id))
        .collect()
}
