use std::path::Path;

use hashsync_core::{
    channel::{CommandChannel, OutputLines},
    error::Error,
    utils::shell_quote,
};

use crate::command::{command_output, execute_command};

use super::UserAtHost;

/// Execute each command with a new external client process (e.g. `ssh`
/// and `scp`, or `plink` and `pscp`)
pub struct ExternalChannel {
    user_at_host: UserAtHost,
    ssh_command: Vec<String>,
    scp_command: Vec<String>,
}

impl ExternalChannel {
    /// `ssh_command` and `scp_command` are whitespace separated command
    /// templates, completed with the target and arguments
    pub fn new(user_at_host: UserAtHost, ssh_command: &str, scp_command: &str) -> Self {
        Self {
            user_at_host,
            ssh_command: split_command(ssh_command),
            scp_command: split_command(scp_command),
        }
    }

    pub fn ssh_arguments(&self, command: &str) -> Vec<String> {
        let mut arguments = self.ssh_command.clone();
        arguments.push(self.user_at_host.to_string());
        arguments.push(command.to_string());
        arguments
    }

    pub fn scp_arguments(&self, local_path: &Path, remote_dir: &str, recursive: bool) -> Vec<String> {
        let mut arguments = self.scp_command.clone();
        if recursive {
            arguments.push("-r".to_string());
        }
        arguments.push(local_path.display().to_string());
        arguments.push(format!("{}:{}", self.user_at_host, remote_target(remote_dir)));
        arguments
    }
}

/// Remote part of a scp target, quoted when the remote shell would split or
/// expand it
fn remote_target(remote_dir: &str) -> String {
    let plain = remote_dir
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+,=@%".contains(c));
    if plain {
        remote_dir.to_string()
    } else {
        shell_quote(remote_dir)
    }
}

fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|part| part.to_string()).collect()
}

impl CommandChannel for ExternalChannel {
    fn describe(&self) -> String {
        format!("{} ({})", self.user_at_host, self.ssh_command.join(" "))
    }

    fn run(&self, command: &str, dry_run: bool) -> Result<OutputLines, Error> {
        log::info!("SSH {}: executing {}", self.user_at_host, command);
        if dry_run {
            return Ok(Box::new(std::iter::empty::<Result<String, Error>>()));
        }
        command_output(&self.ssh_arguments(command))
    }

    fn upload_file(&self, local_path: &Path, remote_dir: &str, dry_run: bool) -> Result<(), Error> {
        log::info!(
            "SCP: copy file {} to {}:{}",
            local_path.display(),
            self.user_at_host,
            remote_dir
        );
        execute_command(&self.scp_arguments(local_path, remote_dir, false), dry_run)
    }

    fn upload_directory(
        &self,
        local_path: &Path,
        remote_dir: &str,
        dry_run: bool,
    ) -> Result<(), Error> {
        log::info!(
            "SCP: copy directory {} to {}:{}",
            local_path.display(),
            self.user_at_host,
            remote_dir
        );
        execute_command(&self.scp_arguments(local_path, remote_dir, true), dry_run)
    }

    fn close(&self) {}
}
