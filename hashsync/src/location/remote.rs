use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use hashsync_core::{
    channel::CommandChannel, hash::HashCommand, tree::ContentTree, utils::normalised_dir,
};

use crate::enumerator::remote::RemoteEnumerator;

use super::{cached_or_enumerated, ContentLocation};

/// A directory reached through a command channel. Its cache file, when
/// present, is always trusted: remote modification times are not used.
pub struct RemoteContentLocation {
    channel: Box<dyn CommandChannel>,
    base_dir: String,
    hash_command: HashCommand,
    find_prefix: String,
    cached_content_file: Option<PathBuf>,
}

impl RemoteContentLocation {
    pub fn new(
        channel: Box<dyn CommandChannel>,
        base_dir: &str,
        hash_command: HashCommand,
        cached_content_file: Option<PathBuf>,
    ) -> Self {
        Self {
            channel,
            base_dir: normalised_dir(base_dir),
            hash_command,
            find_prefix: "".to_string(),
            cached_content_file,
        }
    }

    /// Prefix of the remote `find` executable, like `/usr/bin/`
    pub fn with_find_prefix(mut self, find_prefix: &str) -> Self {
        self.find_prefix = find_prefix.to_string();
        self
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn channel(&self) -> &dyn CommandChannel {
        self.channel.as_ref()
    }

    pub fn full_path(&self, relative_path: &str) -> String {
        format!("{}{}", self.base_dir, relative_path)
    }

    pub fn enumerator(&self) -> RemoteEnumerator<'_> {
        RemoteEnumerator::new(
            self.channel(),
            &self.base_dir,
            &self.find_prefix,
            self.hash_command.clone(),
        )
    }

    pub fn list_files(&self) -> Result<Vec<String>> {
        let file_paths = self
            .enumerator()
            .list_files()
            .context(format!("List files of {}", self))?;
        for file_path in &file_paths {
            log::info!(" {}", file_path);
        }
        Ok(file_paths)
    }

    pub fn close_connections(&self) {
        self.channel.close()
    }
}

impl ContentLocation for RemoteContentLocation {
    fn content_tree(&self) -> Result<ContentTree> {
        cached_or_enumerated(self.cached_content_file(), &self.enumerator())
            .context(format!("Get content tree of {}", self))
    }

    fn cached_content_file(&self) -> Option<&Path> {
        self.cached_content_file.as_deref()
    }
}

impl Display for RemoteContentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} (hash command = {})",
            self.channel.describe(),
            self.base_dir,
            self.hash_command
        )
    }
}
