use std::{
    fmt::Display,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use sha2::{Digest, Sha256};
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::error::Error;

/// A file path relative to a base directory, and the hash of its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePathWithHash {
    relative_path: String,
    hash: String,
}

impl RelativePathWithHash {
    pub fn new(relative_path: String, hash: String) -> Self {
        Self {
            relative_path,
            hash,
        }
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// A command which calculates the hash of files and prints, for each one,
/// a line formatted as `<hexadecimal-hash><spacer><file-path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashCommand {
    command: Vec<String>,
    length: usize,
    spacer_len: usize,
}

impl HashCommand {
    pub fn new(command: Vec<String>, length: usize, spacer_len: usize) -> Self {
        Self {
            command,
            length,
            spacer_len,
        }
    }

    /// GNU `sha256sum`: 64 hex digits, two characters before the file name
    pub fn sha256sum() -> Self {
        Self::new(vec!["sha256sum".to_string()], 64, 2)
    }

    /// BSD `sha256 -r`: 64 hex digits, one space before the file name
    pub fn sha256() -> Self {
        Self::new(vec!["sha256".to_string(), "-r".to_string()], 64, 1)
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn spacer_len(&self) -> usize {
        self.spacer_len
    }

    pub fn parse_file_hash_line(
        &self,
        base_dir: &str,
        file_hash_line: &str,
    ) -> Result<RelativePathWithHash, Error> {
        let hash = file_hash_line
            .get(..self.length)
            .filter(|hash| hash.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| {
                Error::Format(format!(
                    "No {} digits hash at start of line {:?}",
                    self.length, file_hash_line
                ))
            })?;
        let full_path = file_hash_line
            .get(self.length + self.spacer_len..)
            .ok_or_else(|| Error::Format(format!("No file path in line {:?}", file_hash_line)))?;

        match full_path.strip_prefix(base_dir) {
            Some(relative_path) => Ok(RelativePathWithHash::new(
                relative_path.to_string(),
                hash.to_string(),
            )),
            None => Err(Error::Format(format!(
                "File {} from hash line is not in base dir {}",
                full_path, base_dir
            ))),
        }
    }
}

impl Display for HashCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command.join(" "))
    }
}

/// Known hash commands, by the name used in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, StrumDisplay)]
pub enum HashCommandKind {
    #[strum(serialize = "sha256sum")]
    Sha256Sum,
    #[strum(serialize = "sha256")]
    Sha256,
}

impl HashCommandKind {
    pub fn hash_command(&self) -> HashCommand {
        match self {
            HashCommandKind::Sha256Sum => HashCommand::sha256sum(),
            HashCommandKind::Sha256 => HashCommand::sha256(),
        }
    }
}

/// Digest used to hash files of a local directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, StrumDisplay)]
pub enum DigestAlgorithm {
    #[strum(serialize = "sha256")]
    Sha256,
    #[strum(serialize = "md5")]
    Md5,
}

impl DigestAlgorithm {
    pub fn file_digest(&self, file_path: &Path) -> io::Result<String> {
        let file = File::open(file_path)?;
        let len = file.metadata()?.len();
        // Decide on a reasonable buffer size (1MB in this case, fastest will depend on hardware)
        let buf_len = (len.min(1_000_000) as usize).max(1);
        let mut buf = BufReader::with_capacity(buf_len, file);

        match self {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                consume(&mut buf, |part| hasher.update(part))?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            DigestAlgorithm::Md5 => {
                let mut context = md5::Context::new();
                consume(&mut buf, |part| context.consume(part))?;
                Ok(format!("{:x}", context.compute()))
            }
        }
    }
}

fn consume<R: BufRead>(buf: &mut R, mut update: impl FnMut(&[u8])) -> io::Result<()> {
    loop {
        let part = buf.fill_buf()?;
        // If that chunk was empty, the reader has reached EOF
        if part.is_empty() {
            return Ok(());
        }
        update(part);
        let part_len = part.len();
        buf.consume(part_len);
    }
}
