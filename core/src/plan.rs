use std::collections::{HashMap, HashSet};

use crate::tree::ContentTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Directory,
    File,
}

/// Copy a source entry (file, or directory as a whole) into a destination directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyAction {
    pub kind: EntryKind,
    /// Relative path of the entry in the source tree
    pub relative_path: String,
    /// Relative path of the directory to copy into, in the destination tree
    pub destination_dir: String,
}

/// Delete a destination entry (file, or directory as a whole)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteAction {
    pub kind: EntryKind,
    pub relative_path: String,
}

/// Result of comparing a source tree with a destination tree. Actions are
/// ordered as a pre-order traversal (directories first, then files) of the
/// tree they come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub copies: Vec<CopyAction>,
    pub deletes: Vec<DeleteAction>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty() && self.deletes.is_empty()
    }

    /// Copy markings, to annotate the source tree
    pub fn source_marks(&self) -> Marks {
        Marks {
            copy_destinations: self
                .copies
                .iter()
                .map(|copy| {
                    (
                        (copy.kind, copy.relative_path.clone()),
                        copy.destination_dir.clone(),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    /// Delete markings, to annotate the destination tree
    pub fn destination_marks(&self) -> Marks {
        Marks {
            to_be_deleted: self
                .deletes
                .iter()
                .map(|delete| (delete.kind, delete.relative_path.clone()))
                .collect(),
            ..Default::default()
        }
    }
}

/// Lookup of the copy and delete markings of a plan, by entry path
#[derive(Debug, Clone, Default)]
pub struct Marks {
    copy_destinations: HashMap<(EntryKind, String), String>,
    to_be_deleted: HashSet<(EntryKind, String)>,
}

impl Marks {
    pub fn copy_destination(&self, kind: EntryKind, relative_path: &str) -> Option<&str> {
        self.copy_destinations
            .get(&(kind, relative_path.to_string()))
            .map(|destination| destination.as_str())
    }

    pub fn to_be_deleted(&self, kind: EntryKind, relative_path: &str) -> bool {
        self.to_be_deleted
            .contains(&(kind, relative_path.to_string()))
    }
}

/// Compare `source` with `destination`. Anything absent from destination, or
/// a file with a different hash, must be copied. Anything absent from source
/// must be deleted (file hashes are irrelevant for deletion). A directory
/// missing on one side is copied or deleted as a whole.
pub fn mark_sync_operations(source: &ContentTree, destination: &ContentTree) -> SyncPlan {
    let mut plan = SyncPlan::default();
    mark_copy_operations(source, destination, &mut plan.copies);
    mark_delete_operations(destination, source, &mut plan.deletes);
    plan
}

fn mark_copy_operations(
    source_dir: &ContentTree,
    destination_dir: &ContentTree,
    copies: &mut Vec<CopyAction>,
) {
    for dir in source_dir.dirs() {
        let dir_name = dir.name().unwrap_or_default();
        match destination_dir.get_dir(dir_name) {
            Some(destination_sub_dir) => mark_copy_operations(dir, destination_sub_dir, copies),
            None => copies.push(CopyAction {
                kind: EntryKind::Directory,
                relative_path: dir.relative_path(),
                destination_dir: destination_dir.relative_path(),
            }),
        }
    }

    for file in source_dir.files() {
        let up_to_date = destination_dir
            .get_file(file.name())
            .map_or(false, |destination_file| {
                destination_file.hash() == file.hash()
            });
        if !up_to_date {
            copies.push(CopyAction {
                kind: EntryKind::File,
                relative_path: file.relative_path(),
                destination_dir: destination_dir.relative_path(),
            })
        }
    }
}

fn mark_delete_operations(
    destination_dir: &ContentTree,
    source_dir: &ContentTree,
    deletes: &mut Vec<DeleteAction>,
) {
    for dir in destination_dir.dirs() {
        let dir_name = dir.name().unwrap_or_default();
        match source_dir.get_dir(dir_name) {
            Some(source_sub_dir) => mark_delete_operations(dir, source_sub_dir, deletes),
            None => deletes.push(DeleteAction {
                kind: EntryKind::Directory,
                relative_path: dir.relative_path(),
            }),
        }
    }

    for file in destination_dir.files() {
        if source_dir.get_file(file.name()).is_none() {
            deletes.push(DeleteAction {
                kind: EntryKind::File,
                relative_path: file.relative_path(),
            })
        }
    }
}
