use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hashsync_core::{cache, hash::DigestAlgorithm, tree::ContentTree};

use crate::enumerator::{enumerate_content_tree, local::LocalEnumerator};

use super::{cached_or_enumerated, write_cached_content_file, ContentLocation};

/// A directory on this machine
pub struct LocalContentLocation {
    base_dir: PathBuf,
    digest: DigestAlgorithm,
    cached_content_file: Option<PathBuf>,
    trust_cache: bool,
}

impl LocalContentLocation {
    pub fn new(
        base_dir: PathBuf,
        digest: DigestAlgorithm,
        cached_content_file: Option<PathBuf>,
    ) -> Self {
        Self {
            base_dir,
            digest,
            cached_content_file,
            trust_cache: false,
        }
    }

    /// Return the cache file content as is, instead of only reusing its
    /// digests of unmodified files
    pub fn trust_cache(mut self, value: bool) -> Self {
        self.trust_cache = value;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn full_path(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|element| !element.is_empty())
            .fold(self.base_dir.clone(), |path, element| path.join(element))
    }

    fn enumerator(&self) -> LocalEnumerator {
        LocalEnumerator::new(self.base_dir.clone(), self.digest)
    }
}

impl ContentLocation for LocalContentLocation {
    /// Enumerate the directory. Digests of files not modified since the cache
    /// file time are taken from the cache file (see `LocalEnumerator`).
    fn content_tree(&self) -> Result<ContentTree> {
        if self.trust_cache {
            return cached_or_enumerated(self.cached_content_file(), &self.enumerator());
        }

        let cached = match self.cached_content_file() {
            Some(cached_content_file) if cached_content_file.exists() => Some(
                cache::read_map_of_hashes_from_file(cached_content_file).context(format!(
                    "Read cached hashes from {}",
                    cached_content_file.display()
                ))?,
            ),
            _ => None,
        };

        let enumerator = self.enumerator().with_cached_hashes(cached);
        let tree = enumerate_content_tree(&enumerator)
            .context(format!("Enumerate {}", self.base_dir.display()))?;
        write_cached_content_file(self.cached_content_file(), &tree)?;
        Ok(tree)
    }

    fn cached_content_file(&self) -> Option<&Path> {
        self.cached_content_file.as_deref()
    }
}
