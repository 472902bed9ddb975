use std::{
    fs,
    path::{Path, PathBuf},
};

use hashsync_core::{
    channel::{CommandChannel, OutputLines},
    error::Error,
};
use walkdir::WalkDir;

use crate::command::command_output;

/// Destination is a directory on this machine. Commands run through `sh -c`
/// and transfers are plain filesystem copies.
#[derive(Debug, Default)]
pub struct LocalChannel;

impl LocalChannel {
    pub fn new() -> Self {
        Self
    }
}

fn target_path(local_path: &Path, remote_dir: &str) -> Result<PathBuf, Error> {
    let file_name = local_path
        .file_name()
        .ok_or_else(|| Error::InvalidPath(local_path.display().to_string()))?;
    Ok(Path::new(remote_dir).join(file_name))
}

fn copy_directory(local_path: &Path, target_path: &Path) -> Result<(), Error> {
    for entry in WalkDir::new(local_path) {
        let entry = entry.map_err(|error| Error::Io(error.into()))?;
        let relative_path = entry
            .path()
            .strip_prefix(local_path)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?;
        let destination = target_path.join(relative_path);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

impl CommandChannel for LocalChannel {
    fn describe(&self) -> String {
        "local".to_string()
    }

    fn run(&self, command: &str, dry_run: bool) -> Result<OutputLines, Error> {
        log::info!("EXECUTE: {}", command);
        if dry_run {
            return Ok(Box::new(std::iter::empty::<Result<String, Error>>()));
        }
        command_output(&["sh".to_string(), "-c".to_string(), command.to_string()])
    }

    fn upload_file(&self, local_path: &Path, remote_dir: &str, dry_run: bool) -> Result<(), Error> {
        let target_path = target_path(local_path, remote_dir)?;
        log::info!(
            "COPY: file {} to {}",
            local_path.display(),
            target_path.display()
        );
        if !dry_run {
            fs::copy(local_path, &target_path)?;
        }
        Ok(())
    }

    fn upload_directory(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dry_run: bool,
    ) -> Result<(), Error> {
        let target_path = target_path(local_path, remote_dir)?;
        log::info!(
            "COPY: directory {} to {}",
            local_path.display(),
            target_path.display()
        );
        if !dry_run {
            copy_directory(local_path, &target_path)?;
        }
        Ok(())
    }

    fn delete_file(&self, path: &str, dry_run: bool) -> Result<(), Error> {
        log::info!("DELETE: file {}", path);
        if !dry_run {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn delete_directory(&self, path: &str, dry_run: bool) -> Result<(), Error> {
        log::info!("DELETE: directory {}", path);
        if !dry_run {
            fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    fn close(&self) {}
}
