use std::{fs, path::Path};

use anyhow::{bail, Context, Result};

pub fn strbool(value: &str) -> bool {
    ["true", "True", "t", "T", "1"].contains(&value)
}

/// Put "/" at the end of a directory name if it is not already there
pub fn normalised_dir(base_dir: &str) -> String {
    if base_dir.ends_with('/') {
        base_dir.to_string()
    } else {
        format!("{}/", base_dir)
    }
}

/// Split a "/" separated relative path. Empty string means zero elements.
pub fn path_elements(path: &str) -> Vec<String> {
    if path.is_empty() {
        return vec![];
    }
    path.split('/').map(|element| element.to_string()).collect()
}

/// Quote a value to be given as one argument to a remote shell command
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

pub fn ensure_directory_exists(directory: &Path) -> Result<()> {
    if directory.exists() {
        if !directory.is_dir() {
            bail!("{} is a non-directory file", directory.display())
        }
        return Ok(());
    }

    fs::create_dir_all(directory)
        .context(format!("Create directory {}", directory.display()))?;
    Ok(())
}
