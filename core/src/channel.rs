use std::path::Path;

use mockall::automock;

use crate::{error::Error, utils::shell_quote};

/// Output of a command, line by line. An unsuccessful command produces an
/// `Error::CommandFailed` item once its output is consumed.
pub type OutputLines = Box<dyn Iterator<Item = Result<String, Error>>>;

/// Execute commands and transfers against a destination. When `dry_run` is
/// set, the command is reported but not executed (and `run` produces no line).
#[automock]
pub trait CommandChannel {
    /// Human readable description of where commands are executed
    fn describe(&self) -> String;
    fn run(&self, command: &str, dry_run: bool) -> Result<OutputLines, Error>;
    /// Copy a local file into an existing destination directory
    fn upload_file(&self, local_path: &Path, remote_dir: &str, dry_run: bool)
        -> Result<(), Error>;
    /// Copy a local directory (recursively) into an existing destination directory
    fn upload_directory(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dry_run: bool,
    ) -> Result<(), Error>;

    fn delete_file(&self, path: &str, dry_run: bool) -> Result<(), Error> {
        run_to_end(self.run(&format!("rm {}", shell_quote(path)), dry_run)?)
    }

    fn delete_directory(&self, path: &str, dry_run: bool) -> Result<(), Error> {
        run_to_end(self.run(&format!("rm -r {}", shell_quote(path)), dry_run)?)
    }

    /// Release any held connection. Can be called more than once.
    fn close(&self);
}

/// Consume command output, ignoring lines but not errors
pub fn run_to_end(lines: OutputLines) -> Result<(), Error> {
    for line in lines {
        line?;
    }
    Ok(())
}
