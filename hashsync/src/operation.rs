use std::fs;

use anyhow::{Context, Result};
use hashsync_core::{
    plan::{mark_sync_operations, EntryKind, SyncPlan},
    tree::ContentTree,
};

use crate::location::{local::LocalContentLocation, remote::RemoteContentLocation, ContentLocation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Discard both cache files before syncing
    pub full: bool,
    /// Compute and report the operations without executing them
    pub dry_run: bool,
}

/// Make a destination directory identical to a local source directory
pub struct SyncOperation {
    source: LocalContentLocation,
    destination: RemoteContentLocation,
}

impl SyncOperation {
    pub fn new(source: LocalContentLocation, destination: RemoteContentLocation) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn source(&self) -> &LocalContentLocation {
        &self.source
    }

    pub fn destination(&self) -> &RemoteContentLocation {
        &self.destination
    }

    pub fn clear_cached_content_files(&self) -> Result<()> {
        self.source.clear_cached_content_file()?;
        self.destination.clear_cached_content_file()?;
        Ok(())
    }

    pub fn content_trees(&self) -> Result<(ContentTree, ContentTree)> {
        let source_tree = self
            .source
            .content_tree()
            .context(format!("Get content tree of {}", self.source.base_dir().display()))?;
        let destination_tree = self.destination.content_tree()?;
        Ok((source_tree, destination_tree))
    }

    /// Compute copy and delete operations, and report them
    pub fn mark_sync_operations(
        &self,
        source_tree: &ContentTree,
        destination_tree: &ContentTree,
    ) -> SyncPlan {
        let plan = mark_sync_operations(source_tree, destination_tree);
        log::info!(
            "After marking for sync --\nLocal:\n{}\nRemote:\n{}",
            source_tree.show_indented(&plan.source_marks()),
            destination_tree.show_indented(&plan.destination_marks())
        );
        plan
    }

    /// Sync, then close the destination connections (whatever the sync result)
    pub fn do_sync(&self, options: SyncOptions) -> Result<SyncPlan> {
        let result = self.sync(options);
        if let Err(error) = &result {
            log::error!("Sync to {} failed : {:#}", self.destination, error);
        }
        self.destination.close_connections();
        result
    }

    fn sync(&self, options: SyncOptions) -> Result<SyncPlan> {
        if options.full {
            self.clear_cached_content_files()?;
        }

        let (source_tree, destination_tree) = self.content_trees()?;
        let plan = self.mark_sync_operations(&source_tree, &destination_tree);

        // Destination cache file is about to become stale
        if !options.dry_run {
            self.destination.clear_cached_content_file()?;
        }
        self.do_all_copy_operations(&plan, options.dry_run)?;
        self.do_all_delete_operations(&plan, options.dry_run)?;

        if !options.dry_run {
            self.update_destination_cached_content_file()?;
        }
        Ok(plan)
    }

    fn do_all_copy_operations(&self, plan: &SyncPlan, dry_run: bool) -> Result<()> {
        let channel = self.destination.channel();
        for copy in &plan.copies {
            let local_path = self.source.full_path(&copy.relative_path);
            let remote_dir = self.destination.full_path(&copy.destination_dir);
            let result = match copy.kind {
                EntryKind::Directory => channel.upload_directory(&local_path, &remote_dir, dry_run),
                EntryKind::File => channel.upload_file(&local_path, &remote_dir, dry_run),
            };
            result.context(format!("Copy {} to {}", local_path.display(), remote_dir))?;
        }
        Ok(())
    }

    fn do_all_delete_operations(&self, plan: &SyncPlan, dry_run: bool) -> Result<()> {
        let channel = self.destination.channel();
        for delete in &plan.deletes {
            let remote_path = self.destination.full_path(&delete.relative_path);
            let result = match delete.kind {
                EntryKind::Directory => channel.delete_directory(&remote_path, dry_run),
                EntryKind::File => channel.delete_file(&remote_path, dry_run),
            };
            result.context(format!("Delete {}", remote_path))?;
        }
        Ok(())
    }

    /// After a successful sync, destination content is what the source cache
    /// file describes
    fn update_destination_cached_content_file(&self) -> Result<()> {
        if let (Some(source_cache), Some(destination_cache)) = (
            self.source.cached_content_file(),
            self.destination.cached_content_file(),
        ) {
            if source_cache.exists() {
                log::info!(
                    "Copy {} to {}",
                    source_cache.display(),
                    destination_cache.display()
                );
                fs::copy(source_cache, destination_cache).context(format!(
                    "Copy {} to {}",
                    source_cache.display(),
                    destination_cache.display()
                ))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tests::*;
    use hashsync_core::{
        channel::MockCommandChannel,
        error::Error,
        hash::{DigestAlgorithm, HashCommand},
        plan::{CopyAction, DeleteAction},
    };
    use mockall::predicate;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const DESTINATION_DIR: &str = "/srv/data";

    struct Given {
        source_dir: PathBuf,
        source_cache: PathBuf,
        destination_cache: PathBuf,
    }

    /// Source `{a.txt, sub/b.txt}`, destination cache `{a.txt, sub/c.txt}`
    fn given() -> Given {
        let source_dir = tmpdir();
        write_files(&source_dir, &[("a.txt", "a"), ("sub/b.txt", "b")]);
        let caches_dir = tmpdir();
        let destination_cache = caches_dir.join("destination.cache");
        fs::write(
            &destination_cache,
            format!(
                "T 2024-01-15 09:30:00.123 +0000\nD sub\nF {} a.txt\nF h3 sub/c.txt\n",
                SHA256_OF_A
            ),
        )
        .unwrap();
        Given {
            source_dir,
            source_cache: caches_dir.join("source.cache"),
            destination_cache,
        }
    }

    fn mock_channel() -> MockCommandChannel {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_describe()
            .returning(|| "bob@example.com".to_string());
        channel
    }

    fn operation(given: &Given, channel: MockCommandChannel) -> SyncOperation {
        SyncOperation::new(
            LocalContentLocation::new(
                given.source_dir.clone(),
                DigestAlgorithm::Sha256,
                Some(given.source_cache.clone()),
            ),
            RemoteContentLocation::new(
                Box::new(channel),
                DESTINATION_DIR,
                HashCommand::sha256sum(),
                Some(given.destination_cache.clone()),
            ),
        )
    }

    fn expected_plan() -> SyncPlan {
        SyncPlan {
            copies: vec![CopyAction {
                kind: EntryKind::File,
                relative_path: "sub/b.txt".to_string(),
                destination_dir: "sub".to_string(),
            }],
            deletes: vec![DeleteAction {
                kind: EntryKind::File,
                relative_path: "sub/c.txt".to_string(),
            }],
        }
    }

    fn expect_scenario_operations(channel: &mut MockCommandChannel, given: &Given, dry_run: bool) {
        channel.expect_run().times(0);
        channel
            .expect_upload_file()
            .with(
                predicate::eq(given.source_dir.join("sub").join("b.txt")),
                predicate::eq("/srv/data/sub".to_string()),
                predicate::eq(dry_run),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));
        channel
            .expect_delete_file()
            .with(
                predicate::eq("/srv/data/sub/c.txt".to_string()),
                predicate::eq(dry_run),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        channel.expect_upload_directory().times(0);
        channel.expect_delete_directory().times(0);
        channel.expect_close().times(1).return_const(());
    }

    #[test]
    fn test_sync() {
        // Given
        let given = given();
        let mut channel = mock_channel();
        expect_scenario_operations(&mut channel, &given, false);
        let operation = operation(&given, channel);

        // When
        let plan = operation.do_sync(SyncOptions::default()).unwrap();

        // Then
        assert_eq!(plan, expected_plan());
        assert_eq!(
            fs::read_to_string(&given.destination_cache).unwrap(),
            fs::read_to_string(&given.source_cache).unwrap()
        );
    }

    #[test]
    fn test_dry_run_sync() {
        // Given
        let given = given();
        let destination_cache_before = fs::read_to_string(&given.destination_cache).unwrap();
        let mut channel = mock_channel();
        expect_scenario_operations(&mut channel, &given, true);
        let operation = operation(&given, channel);

        // When
        let plan = operation
            .do_sync(SyncOptions {
                full: false,
                dry_run: true,
            })
            .unwrap();

        // Then
        assert_eq!(plan, expected_plan());
        assert_eq!(
            fs::read_to_string(&given.destination_cache).unwrap(),
            destination_cache_before
        );
    }

    #[test]
    fn test_full_sync_enumerates_destination() {
        // Given
        let given = given();
        let mut channel = mock_channel();
        channel
            .expect_run()
            .with(
                predicate::eq("find '/srv/data/' -type d -print".to_string()),
                predicate::eq(false),
            )
            .times(1)
            .returning(|_, _| Ok(Box::new(std::iter::once(Ok::<String, Error>("/srv/data/".to_string())))));
        channel
            .expect_run()
            .with(
                predicate::eq("find '/srv/data/' -type f -print0 | xargs -0 -r sha256sum".to_string()),
                predicate::eq(false),
            )
            .times(1)
            .returning(|_, _| Ok(Box::new(std::iter::empty::<Result<String, Error>>())));
        channel
            .expect_upload_file()
            .with(
                predicate::eq(given.source_dir.join("a.txt")),
                predicate::eq("/srv/data/".to_string()),
                predicate::eq(false),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));
        channel
            .expect_upload_directory()
            .with(
                predicate::eq(given.source_dir.join("sub")),
                predicate::eq("/srv/data/".to_string()),
                predicate::eq(false),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));
        channel.expect_delete_file().times(0);
        channel.expect_delete_directory().times(0);
        channel.expect_close().times(1).return_const(());
        let operation = operation(&given, channel);

        // When
        let plan = operation
            .do_sync(SyncOptions {
                full: true,
                dry_run: false,
            })
            .unwrap();

        // Then
        assert_eq!(
            plan.copies,
            vec![
                CopyAction {
                    kind: EntryKind::Directory,
                    relative_path: "sub".to_string(),
                    destination_dir: "".to_string(),
                },
                CopyAction {
                    kind: EntryKind::File,
                    relative_path: "a.txt".to_string(),
                    destination_dir: "".to_string(),
                },
            ]
        );
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn test_failed_copy_stops_sync_and_closes_channel() {
        // Given
        let given = given();
        let mut channel = mock_channel();
        channel
            .expect_upload_file()
            .times(1)
            .returning(|_, _, _| Err(Error::command_failed("scp", "exit status = 1")));
        channel.expect_delete_file().times(0);
        channel.expect_close().times(1).return_const(());
        let operation = operation(&given, channel);

        // When
        let error = operation.do_sync(SyncOptions::default()).unwrap_err();

        // Then
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::CommandFailed { .. })
        ));
        // Stale destination cache was removed and not replaced
        assert!(!given.destination_cache.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sync_with_local_channel() {
        use crate::channel::local::LocalChannel;

        // Given
        let source_dir = tmpdir();
        let destination_dir = tmpdir();
        write_files(
            &source_dir,
            &[("a.txt", "a"), ("sub/b.txt", "b"), ("sub/deep/c.txt", "c")],
        );
        write_files(
            &destination_dir,
            &[("a.txt", "old"), ("sub/old.txt", "old"), ("gone/x.txt", "x")],
        );
        let operation = || {
            SyncOperation::new(
                LocalContentLocation::new(source_dir.clone(), DigestAlgorithm::Sha256, None),
                RemoteContentLocation::new(
                    Box::new(LocalChannel::new()),
                    destination_dir.to_str().unwrap(),
                    HashCommand::sha256sum(),
                    None,
                ),
            )
        };

        // When
        operation().do_sync(SyncOptions::default()).unwrap();

        // Then
        assert_eq!(disk_entries(&destination_dir), disk_entries(&source_dir));
        assert_eq!(
            fs::read_to_string(destination_dir.join("a.txt")).unwrap(),
            "a"
        );
        let second_plan = operation().do_sync(SyncOptions::default()).unwrap();
        assert!(second_plan.is_empty());
    }
}
