use std::{fs, path::PathBuf};

use anyhow::{Context as _, Result};
use env_logger::Env;
use hashsync::{
    context::{Context, Destination},
    operation::SyncOptions,
};
use hashsync_core::{
    config::Config,
    hash::{DigestAlgorithm, HashCommandKind},
};
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "hashsync")]
struct Opt {
    /// Local directory to sync from
    #[structopt(parse(from_os_str))]
    source: PathBuf,

    /// `[user@]host:dir` (or `:dir` with host from config), or a local directory
    destination: String,

    /// Discard cache files before syncing
    #[structopt(long)]
    full: bool,

    /// Show what would be done, without doing it
    #[structopt(long)]
    dry_run: bool,

    /// Use external ssh and scp programs instead of the in-process session
    #[structopt(long)]
    external: bool,

    /// Take the local cache file content as is (no modification time check)
    #[structopt(long)]
    trust_local_cache: bool,

    /// Only list destination files
    #[structopt(long)]
    list_files: bool,

    #[structopt(long)]
    ssh_command: Option<String>,

    #[structopt(long)]
    scp_command: Option<String>,

    #[structopt(long)]
    find_prefix: Option<String>,

    /// sha256sum or sha256
    #[structopt(long)]
    hash_command: Option<HashCommandKind>,

    /// Local digest: sha256 or md5
    #[structopt(long)]
    digest: Option<DigestAlgorithm>,

    #[structopt(long, parse(from_os_str))]
    source_cache: Option<PathBuf>,

    #[structopt(long, parse(from_os_str))]
    destination_cache: Option<PathBuf>,

    /// Config file (default is ~/.hashsync.conf)
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
}

impl Opt {
    fn to_context(&self, config: &Config) -> Result<Context> {
        let source_dir = fs::canonicalize(&self.source)
            .context(format!("Source directory {}", self.source.display()))?;
        let destination =
            Destination::parse(&self.destination, config.user_at_host.as_deref())?;

        let mut context = Context::from_config(config, source_dir, destination);
        if self.external {
            context.internal = false;
        }
        if let Some(ssh_command) = &self.ssh_command {
            context.ssh_command = ssh_command.clone();
        }
        if let Some(scp_command) = &self.scp_command {
            context.scp_command = scp_command.clone();
        }
        if let Some(find_prefix) = &self.find_prefix {
            context.find_prefix = find_prefix.clone();
        }
        if let Some(hash_command) = self.hash_command {
            context.hash_command = hash_command;
        }
        if let Some(digest) = self.digest {
            context.digest = digest;
        }
        if self.source_cache.is_some() {
            context.source_cache = self.source_cache.clone();
        }
        if self.destination_cache.is_some() {
            context.destination_cache = self.destination_cache.clone();
        }
        context.trust_local_cache = self.trust_local_cache;
        context.options = SyncOptions {
            full: self.full,
            dry_run: self.dry_run,
        };

        Ok(context)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();

    let config = match &opt.config {
        Some(config_file_path) => Config::from_file(config_file_path)?,
        None => Config::from_env()?,
    };
    let context = opt.to_context(&config)?;
    log::debug!("{:?}", context);
    let operation = context.sync_operation()?;

    if opt.list_files {
        let result = operation.destination().list_files();
        operation.destination().close_connections();
        result?;
        return Ok(());
    }

    log::info!(
        "Sync {} to {}",
        context.source_dir.display(),
        operation.destination()
    );
    let plan = operation.do_sync(context.options)?;
    log::info!(
        "Done ({} copies, {} deletes)",
        plan.copies.len(),
        plan.deletes.len()
    );
    Ok(())
}
