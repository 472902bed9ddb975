use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context as _, Result};
use hashsync_core::{
    channel::CommandChannel,
    config::Config,
    hash::{DigestAlgorithm, HashCommandKind},
    utils::ensure_directory_exists,
};

use crate::{
    channel::{external::ExternalChannel, internal::InternalChannel, local::LocalChannel, UserAtHost},
    location::{local::LocalContentLocation, remote::RemoteContentLocation},
    operation::{SyncOperation, SyncOptions},
};

/// Where to sync to : `[user@]host:dir`, or a local directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Remote { user_at_host: UserAtHost, dir: String },
    Local { dir: String },
}

impl Destination {
    /// Parse a destination. With `:dir` form, host is taken from `default_user_at_host`.
    /// A `/` before the first `:` means a local path (e.g. `./backup:2024`).
    pub fn parse(value: &str, default_user_at_host: Option<&str>) -> Result<Self> {
        match value
            .split_once(':')
            .filter(|(raw_user_at_host, _)| !raw_user_at_host.contains('/'))
        {
            Some((raw_user_at_host, dir)) => {
                if dir.is_empty() {
                    bail!("No directory in destination '{}'", value)
                }
                let raw_user_at_host = match (raw_user_at_host, default_user_at_host) {
                    ("", Some(default_user_at_host)) => default_user_at_host,
                    ("", None) => bail!("No host in destination '{}' nor in config", value),
                    (raw_user_at_host, _) => raw_user_at_host,
                };
                Ok(Self::Remote {
                    user_at_host: UserAtHost::from_str(raw_user_at_host)?,
                    dir: dir.to_string(),
                })
            }
            None => Ok(Self::Local {
                dir: value.to_string(),
            }),
        }
    }

    pub fn dir(&self) -> &str {
        match self {
            Destination::Remote { dir, .. } | Destination::Local { dir } => dir,
        }
    }

    /// File name friendly identifier of the destination
    pub fn label(&self) -> String {
        file_name_label(&self.to_string())
    }
}

fn file_name_label(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

impl Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Remote { user_at_host, dir } => write!(f, "{}:{}", user_at_host, dir),
            Destination::Local { dir } => f.write_str(dir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub source_dir: PathBuf,
    pub destination: Destination,
    pub internal: bool,
    pub ssh_command: String,
    pub scp_command: String,
    pub find_prefix: String,
    pub hash_command: HashCommandKind,
    pub digest: DigestAlgorithm,
    pub source_cache: Option<PathBuf>,
    pub destination_cache: Option<PathBuf>,
    pub trust_local_cache: bool,
    pub options: SyncOptions,
}

impl Context {
    pub fn from_config(config: &Config, source_dir: PathBuf, destination: Destination) -> Self {
        let (source_cache, destination_cache) = match &config.cache_dir {
            Some(cache_dir) => {
                let (source_cache, destination_cache) =
                    cache_file_paths(cache_dir, &source_dir, &destination);
                (Some(source_cache), Some(destination_cache))
            }
            None => (None, None),
        };

        Self {
            source_dir,
            destination,
            internal: config.internal,
            ssh_command: config.ssh_command.clone(),
            scp_command: config.scp_command.clone(),
            find_prefix: config.find_prefix.clone(),
            hash_command: config.hash_command,
            digest: config.digest,
            source_cache,
            destination_cache,
            trust_local_cache: false,
            options: SyncOptions::default(),
        }
    }

    pub fn channel(&self) -> Box<dyn CommandChannel> {
        match &self.destination {
            Destination::Remote { user_at_host, .. } if self.internal => {
                Box::new(InternalChannel::new(user_at_host.clone()))
            }
            Destination::Remote { user_at_host, .. } => Box::new(ExternalChannel::new(
                user_at_host.clone(),
                &self.ssh_command,
                &self.scp_command,
            )),
            Destination::Local { .. } => Box::new(LocalChannel::new()),
        }
    }

    pub fn source_location(&self) -> LocalContentLocation {
        LocalContentLocation::new(
            self.source_dir.clone(),
            self.digest,
            self.source_cache.clone(),
        )
        .trust_cache(self.trust_local_cache)
    }

    pub fn destination_location(&self) -> RemoteContentLocation {
        RemoteContentLocation::new(
            self.channel(),
            self.destination.dir(),
            self.hash_command.hash_command(),
            self.destination_cache.clone(),
        )
        .with_find_prefix(&self.find_prefix)
    }

    /// Build the sync operation, creating cache file directories if needed
    pub fn sync_operation(&self) -> Result<SyncOperation> {
        for cache_file in [&self.source_cache, &self.destination_cache]
            .into_iter()
            .flatten()
        {
            if let Some(cache_dir) = cache_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                ensure_directory_exists(cache_dir)
                    .context(format!("Prepare cache directory of {}", cache_file.display()))?;
            }
        }

        Ok(SyncOperation::new(
            self.source_location(),
            self.destination_location(),
        ))
    }
}

/// Cache files of one source and destination pair. Source directory is part
/// of the name: a source cache must never describe another source directory.
pub fn cache_file_paths(
    cache_dir: &Path,
    source_dir: &Path,
    destination: &Destination,
) -> (PathBuf, PathBuf) {
    let source_dir = fs::canonicalize(source_dir).unwrap_or_else(|_| source_dir.to_path_buf());
    let label = format!(
        "{}__{}",
        file_name_label(&source_dir.display().to_string()),
        destination.label()
    );
    (
        cache_dir.join(format!("{}.source.cache", label)),
        cache_dir.join(format!("{}.destination.cache", label)),
    )
}
