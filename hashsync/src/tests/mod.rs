use std::{
    fs,
    path::{Path, PathBuf},
};

use testdir::testdir;
use uuid::Uuid;
use walkdir::WalkDir;

pub fn tmpdir() -> PathBuf {
    let path = testdir!().join(PathBuf::from(Uuid::new_v4().to_string()));
    fs::create_dir_all(&path).unwrap();
    path
}

/// Write files (relative path, content) under `base_dir`, creating parent directories
pub fn write_files(base_dir: &Path, files: &[(&str, &str)]) {
    for (relative_path, content) in files {
        let file_path = base_dir.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file_path, content).unwrap();
    }
}

/// Sorted "/" separated relative paths of everything under `base_dir`, with
/// a trailing "/" for directories
pub fn disk_entries(base_dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(base_dir)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative_path = entry
                .path()
                .strip_prefix(base_dir)
                .unwrap()
                .to_str()
                .unwrap()
                .replace('\\', "/");
            if entry.file_type().is_dir() {
                format!("{}/", relative_path)
            } else {
                relative_path
            }
        })
        .collect();
    entries.sort();
    entries
}

pub const SHA256_OF_A: &str = "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb";
pub const SHA256_OF_B: &str = "3e23e8160039594a33894f6564e1b1348bbd7a0088d42c4acb73eeaed59c009d";
