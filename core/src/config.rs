use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};

use ini::Ini;

use crate::{
    hash::{DigestAlgorithm, HashCommandKind},
    utils::strbool,
};

pub const CONFIG_FILE_NAME: &str = ".hashsync.conf";
pub const DEFAULT_SSH_COMMAND: &str = "ssh";
pub const DEFAULT_SCP_COMMAND: &str = "scp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub user_at_host: Option<String>,
    /// Use the in-process SSH session instead of external ssh/scp programs
    pub internal: bool,
    pub ssh_command: String,
    pub scp_command: String,
    /// Prefix of the remote `find` executable (usually empty)
    pub find_prefix: String,
    pub hash_command: HashCommandKind,
    pub digest: DigestAlgorithm,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_at_host: None,
            internal: true,
            ssh_command: DEFAULT_SSH_COMMAND.to_string(),
            scp_command: DEFAULT_SCP_COMMAND.to_string(),
            find_prefix: "".to_string(),
            hash_command: HashCommandKind::Sha256Sum,
            digest: DigestAlgorithm::Sha256,
            cache_dir: None,
        }
    }
}

impl Config {
    pub fn default_file_path() -> Result<PathBuf> {
        let user_home_folder_path = dirs::home_dir().context("Unable to determine home folder")?;
        Ok(user_home_folder_path.join(CONFIG_FILE_NAME))
    }

    /// Read config from default file path, or default config if there is no file
    pub fn from_env() -> Result<Self> {
        let config_file_path = Self::default_file_path()?;
        if !config_file_path.exists() {
            log::debug!(
                "No config file at '{}', use default config",
                config_file_path.display()
            );
            return Ok(Self::default());
        }
        Self::from_file(&config_file_path)
    }

    pub fn from_file(config_file_path: &Path) -> Result<Self> {
        let config_ini = Ini::load_from_file(config_file_path).context(format!(
            "Error when loading config file at '{}'",
            config_file_path.display()
        ))?;
        Self::from_ini(config_ini)
    }

    pub fn from_ini(config_ini: Ini) -> Result<Self> {
        let default = Self::default();
        let ssh = config_ini.section(Some("ssh"));
        let sync = config_ini.section(Some("sync"));

        let user_at_host = ssh
            .and_then(|ssh| ssh.get("user_at_host"))
            .map(|v| v.to_string());
        let internal = ssh
            .and_then(|ssh| ssh.get("internal"))
            .map(strbool)
            .unwrap_or(default.internal);
        let ssh_command = ssh
            .and_then(|ssh| ssh.get("ssh_command"))
            .map(|v| v.to_string())
            .unwrap_or(default.ssh_command);
        let scp_command = ssh
            .and_then(|ssh| ssh.get("scp_command"))
            .map(|v| v.to_string())
            .unwrap_or(default.scp_command);
        let find_prefix = ssh
            .and_then(|ssh| ssh.get("find_prefix"))
            .map(|v| v.to_string())
            .unwrap_or(default.find_prefix);

        let hash_command = match sync.and_then(|sync| sync.get("hash_command")) {
            Some(value) => HashCommandKind::from_str(value)
                .context(format!("Unknown hash_command '{}' in sync section", value))?,
            None => default.hash_command,
        };
        let digest = match sync.and_then(|sync| sync.get("digest")) {
            Some(value) => DigestAlgorithm::from_str(value)
                .context(format!("Unknown digest '{}' in sync section", value))?,
            None => default.digest,
        };
        let cache_dir = sync
            .and_then(|sync| sync.get("cache_dir"))
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            user_at_host,
            internal,
            ssh_command,
            scp_command,
            find_prefix,
            hash_command,
            digest,
            cache_dir,
        })
    }
}
