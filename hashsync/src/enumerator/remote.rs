use hashsync_core::{
    channel::CommandChannel,
    error::Error,
    hash::{HashCommand, RelativePathWithHash},
    utils::{normalised_dir, shell_quote},
};

use super::ContentEnumerator;

/// Enumerate a directory through a `CommandChannel`, with `find` and a hash
/// command. Every listed path must be inside the base directory.
pub struct RemoteEnumerator<'a> {
    channel: &'a dyn CommandChannel,
    base_dir: String,
    find_prefix: String,
    hash_command: HashCommand,
}

impl<'a> RemoteEnumerator<'a> {
    pub fn new(
        channel: &'a dyn CommandChannel,
        base_dir: &str,
        find_prefix: &str,
        hash_command: HashCommand,
    ) -> Self {
        Self {
            channel,
            base_dir: normalised_dir(base_dir),
            find_prefix: find_prefix.to_string(),
            hash_command,
        }
    }

    fn find_command(&self, type_: &str) -> String {
        format!(
            "{}find {} -type {} -print",
            self.find_prefix,
            shell_quote(&self.base_dir),
            type_
        )
    }

    pub fn list_directories_command(&self) -> String {
        self.find_command("d")
    }

    pub fn list_file_hashes_command(&self) -> String {
        format!(
            "{}find {} -type f -print0 | xargs -0 -r {}",
            self.find_prefix,
            shell_quote(&self.base_dir),
            self.hash_command
        )
    }

    fn relative_path<'l>(&self, line: &'l str) -> Result<&'l str, Error> {
        line.strip_prefix(&self.base_dir).ok_or_else(|| {
            Error::Protocol(format!(
                "Listed path {:?} is not in base directory {:?}",
                line, self.base_dir
            ))
        })
    }

    /// Lines of a listing command. Listing has no side effect, so it is run
    /// even in dry run mode.
    fn listed_lines(&self, command: &str) -> Result<Vec<String>, Error> {
        let mut lines = vec![];
        for line in self.channel.run(command, false)? {
            let line = line?;
            log::debug!(" {}", line);
            lines.push(line);
        }
        Ok(lines)
    }

    /// Relative paths of all files, without hashes
    pub fn list_files(&self) -> Result<Vec<String>, Error> {
        let mut file_paths = vec![];
        for line in self.listed_lines(&self.find_command("f"))? {
            file_paths.push(self.relative_path(&line)?.to_string());
        }
        Ok(file_paths)
    }
}

impl<'a> ContentEnumerator for RemoteEnumerator<'a> {
    fn list_directories(&self) -> Result<Vec<String>, Error> {
        let mut dir_paths = vec![];
        for line in self.listed_lines(&self.list_directories_command())? {
            // The base directory itself
            if line == self.base_dir || normalised_dir(&line) == self.base_dir {
                continue;
            }
            dir_paths.push(self.relative_path(&line)?.to_string());
        }
        Ok(dir_paths)
    }

    fn list_file_hashes(&self) -> Result<Vec<RelativePathWithHash>, Error> {
        let path_start = self.hash_command.length() + self.hash_command.spacer_len();
        let mut file_hashes = vec![];
        for line in self.listed_lines(&self.list_file_hashes_command())? {
            if let Some(full_path) = line.get(path_start..) {
                self.relative_path(full_path)?;
            }
            file_hashes.push(
                self.hash_command
                    .parse_file_hash_line(&self.base_dir, &line)?,
            );
        }
        Ok(file_hashes)
    }
}
