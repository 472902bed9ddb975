use std::{fs, path::Path};

use anyhow::{Context, Result};
use hashsync_core::{cache, tree::ContentTree};

use crate::enumerator::{enumerate_content_tree, ContentEnumerator};

pub mod local;
pub mod remote;

/// A directory which content can be described as a content tree, optionally
/// through a cache file
pub trait ContentLocation {
    fn content_tree(&self) -> Result<ContentTree>;
    fn cached_content_file(&self) -> Option<&Path>;

    /// Delete the cache file, if any, so the next content tree is enumerated
    fn clear_cached_content_file(&self) -> Result<()> {
        if let Some(cached_content_file) = self.cached_content_file() {
            if cached_content_file.exists() {
                log::info!(
                    "Deleting cached content file {} ...",
                    cached_content_file.display()
                );
                fs::remove_file(cached_content_file).context(format!(
                    "Delete cached content file {}",
                    cached_content_file.display()
                ))?;
            }
        }
        Ok(())
    }
}

/// Existing cache file content, or a new enumeration (written to the cache
/// file when there is one)
pub fn cached_or_enumerated(
    cached_content_file: Option<&Path>,
    enumerator: &dyn ContentEnumerator,
) -> Result<ContentTree> {
    if let Some(cached_content_file) = cached_content_file {
        if cached_content_file.exists() {
            return cache::read_from_file(cached_content_file).context(format!(
                "Read cached content file {}",
                cached_content_file.display()
            ));
        }
        log::info!(
            "Cached content file {} does not yet exist",
            cached_content_file.display()
        );
    }

    let tree = enumerate_content_tree(enumerator).context("Enumerate content")?;
    write_cached_content_file(cached_content_file, &tree)?;
    Ok(tree)
}

pub fn write_cached_content_file(
    cached_content_file: Option<&Path>,
    tree: &ContentTree,
) -> Result<()> {
    if let Some(cached_content_file) = cached_content_file {
        cache::write_to_file(tree, cached_content_file).context(format!(
            "Write cached content file {}",
            cached_content_file.display()
        ))?;
    }
    Ok(())
}
