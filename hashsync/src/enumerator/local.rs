use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use hashsync_core::{
    cache::CachedHashes, error::Error, hash::DigestAlgorithm, hash::RelativePathWithHash,
};
use walkdir::{DirEntry, WalkDir};

use super::ContentEnumerator;

/// Enumerate a local directory, computing file digests with `digest`.
///
/// With cached hashes, the digest of a file is reused when the cache has one
/// for the same path and the file modification time is strictly earlier than
/// the cache time. This is a heuristic: a file moved (or a parent directory
/// renamed) without touching its modification time keeps a stale digest.
pub struct LocalEnumerator {
    base_dir: PathBuf,
    digest: DigestAlgorithm,
    cached: Option<CachedHashes>,
}

impl LocalEnumerator {
    pub fn new(base_dir: PathBuf, digest: DigestAlgorithm) -> Self {
        Self {
            base_dir,
            digest,
            cached: None,
        }
    }

    pub fn with_cached_hashes(mut self, cached: Option<CachedHashes>) -> Self {
        self.cached = cached;
        self
    }

    fn entries(&self) -> impl Iterator<Item = Result<DirEntry, Error>> {
        WalkDir::new(&self.base_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .map(|entry| entry.map_err(|error| Error::Io(error.into())))
    }

    fn relative_path(&self, path: &Path) -> Result<String, Error> {
        let relative_path = path
            .strip_prefix(&self.base_dir)
            .map_err(|_| Error::InvalidPath(path.display().to_string()))?;
        let mut elements = vec![];
        for component in relative_path.components() {
            let element = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;
            elements.push(element);
        }
        Ok(elements.join("/"))
    }

    /// Relative paths and modification times of all files
    pub fn list_files(&self) -> Result<Vec<(String, DateTime<Utc>)>, Error> {
        let mut files = vec![];
        for entry in self.entries() {
            let entry = entry?;
            if entry.file_type().is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|error| Error::Io(error.into()))?;
                let modified: DateTime<Utc> = metadata.modified()?.into();
                files.push((self.relative_path(entry.path())?, modified));
            }
        }
        Ok(files)
    }

    fn cached_digest(&self, relative_path: &str, file_path: &Path) -> Result<Option<String>, Error> {
        let cached = match &self.cached {
            Some(cached) => cached,
            None => return Ok(None),
        };
        let (cache_time, cached_hash) = match (cached.time, cached.hashes.get(relative_path)) {
            (Some(cache_time), Some(cached_hash)) => (cache_time, cached_hash),
            _ => return Ok(None),
        };

        let modified: DateTime<Utc> = fs::metadata(file_path)?.modified()?.into();
        if modified < cache_time {
            Ok(Some(cached_hash.clone()))
        } else {
            Ok(None)
        }
    }
}

impl ContentEnumerator for LocalEnumerator {
    fn list_directories(&self) -> Result<Vec<String>, Error> {
        let mut dir_paths = vec![];
        for entry in self.entries() {
            let entry = entry?;
            if entry.file_type().is_dir() {
                dir_paths.push(self.relative_path(entry.path())?);
            }
        }
        Ok(dir_paths)
    }

    fn list_file_hashes(&self) -> Result<Vec<RelativePathWithHash>, Error> {
        let mut file_hashes = vec![];
        for entry in self.entries() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = self.relative_path(entry.path())?;
            let hash = match self.cached_digest(&relative_path, entry.path())? {
                Some(hash) => hash,
                None => {
                    log::debug!("Compute {} of {}", self.digest, entry.path().display());
                    self.digest.file_digest(entry.path())?
                }
            };
            file_hashes.push(RelativePathWithHash::new(relative_path, hash));
        }
        Ok(file_hashes)
    }
}
