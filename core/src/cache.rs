use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::{error::Error, tree::ContentTree};

/// Millisecond precision and explicit offset, e.g. `2024-01-15 09:30:00.123 +0000`
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
// Reading accepts any fraction length
const DATE_TIME_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";
const DIR_LINE_PREFIX: &str = "D ";
const FILE_LINE_PREFIX: &str = "F ";
const TIME_LINE_PREFIX: &str = "T ";

enum CacheLine<'a> {
    Dir(&'a str),
    File { hash: &'a str, relative_path: &'a str },
    Time(DateTime<Utc>),
    Empty,
}

fn parse_line(line: &str) -> Result<CacheLine<'_>, Error> {
    if line.is_empty() {
        return Ok(CacheLine::Empty);
    }
    if let Some(dir_path) = line.strip_prefix(DIR_LINE_PREFIX) {
        return Ok(CacheLine::Dir(dir_path));
    }
    if let Some(hash_and_path) = line.strip_prefix(FILE_LINE_PREFIX) {
        if let Some((hash, relative_path)) = hash_and_path.split_once(' ') {
            return Ok(CacheLine::File {
                hash,
                relative_path,
            });
        }
    }
    if let Some(raw_time) = line.strip_prefix(TIME_LINE_PREFIX) {
        return Ok(CacheLine::Time(parse_time(raw_time)?));
    }

    Err(Error::Format(format!(
        "Invalid line in content tree file: {:?}",
        line
    )))
}

pub fn parse_time(raw_time: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_str(raw_time, DATE_TIME_PARSE_FORMAT)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|error| Error::Format(format!("Invalid time {:?}: {}", raw_time, error)))
}

pub fn format_time(time: &DateTime<Utc>) -> String {
    time.format(DATE_TIME_FORMAT).to_string()
}

/// Write the tree as `T`, `D` and `F` lines, directories before their content
pub fn write_lines<W: Write>(tree: &ContentTree, out: &mut W) -> io::Result<()> {
    if let Some(time) = tree.time() {
        writeln!(out, "{}{}", TIME_LINE_PREFIX, format_time(&time))?;
    }
    write_dir_lines(tree, out, "")
}

fn write_dir_lines<W: Write>(tree: &ContentTree, out: &mut W, prefix: &str) -> io::Result<()> {
    for dir in tree.dirs() {
        let dir_name = dir.name().unwrap_or_default();
        writeln!(out, "{}{}{}", DIR_LINE_PREFIX, prefix, dir_name)?;
        write_dir_lines(dir, out, &format!("{}{}/", prefix, dir_name))?;
    }
    for file in tree.files() {
        writeln!(
            out,
            "{}{} {}{}",
            FILE_LINE_PREFIX,
            file.hash(),
            prefix,
            file.name()
        )?;
    }
    Ok(())
}

pub fn write_to_file(tree: &ContentTree, file_path: &Path) -> Result<(), Error> {
    log::info!("Writing content tree to file {} ...", file_path.display());
    let directory = match file_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temporary = NamedTempFile::new_in(directory)?;
    {
        let mut out = BufWriter::new(temporary.as_file());
        write_lines(tree, &mut out)?;
        out.flush()?;
    }
    temporary
        .persist(file_path)
        .map_err(|error| Error::Io(error.error))?;
    Ok(())
}

pub fn read_lines<R: BufRead>(reader: R) -> Result<ContentTree, Error> {
    let mut tree = ContentTree::new();
    for line in reader.lines() {
        let line = line?;
        match parse_line(&line)? {
            CacheLine::Dir(dir_path) => tree.add_dir(dir_path),
            CacheLine::File {
                hash,
                relative_path,
            } => tree.add_file(relative_path, hash)?,
            CacheLine::Time(time) => tree.set_time(Some(time)),
            CacheLine::Empty => {}
        }
    }
    Ok(tree)
}

pub fn read_from_file(file_path: &Path) -> Result<ContentTree, Error> {
    log::info!("Reading content tree from {} ...", file_path.display());
    read_lines(BufReader::new(File::open(file_path)?))
}

/// Time and file hashes of a cache file, without building a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedHashes {
    pub time: Option<DateTime<Utc>>,
    pub hashes: HashMap<String, String>,
}

pub fn read_map_of_hashes<R: BufRead>(reader: R) -> Result<CachedHashes, Error> {
    let mut cached = CachedHashes::default();
    for line in reader.lines() {
        let line = line?;
        match parse_line(&line)? {
            CacheLine::File {
                hash,
                relative_path,
            } => {
                cached
                    .hashes
                    .insert(relative_path.to_string(), hash.to_string());
            }
            CacheLine::Time(time) => cached.time = Some(time),
            CacheLine::Dir(_) | CacheLine::Empty => {}
        }
    }
    Ok(cached)
}

pub fn read_map_of_hashes_from_file(file_path: &Path) -> Result<CachedHashes, Error> {
    log::info!("Reading cached file hashes from {} ...", file_path.display());
    read_map_of_hashes(BufReader::new(File::open(file_path)?))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    const CACHE: &str = "T 2024-01-15 09:30:00.123 +0000
D sub
D sub/dirA
F 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08 sub/dirA/file1.txt
F e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855 sub/file2.txt
";

    fn time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap() + chrono::Duration::milliseconds(123)
    }

    fn sample_tree() -> ContentTree {
        let mut tree = ContentTree::new();
        tree.set_time(Some(time()));
        tree.add_file("z.txt", "h3").unwrap();
        tree.add_file("sub/with space.txt", "h2").unwrap();
        tree.add_dir("empty/nested");
        tree.add_file("a.txt", "h1").unwrap();
        tree
    }

    fn write_to_string(tree: &ContentTree) -> String {
        let mut out = vec![];
        write_lines(tree, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_read_lines() {
        // When
        let tree = read_lines(Cursor::new(CACHE)).unwrap();

        // Then
        assert_eq!(tree.time(), Some(time()));
        let sub = tree.get_dir("sub").unwrap();
        let dir_a = sub.get_dir("dirA").unwrap();
        assert_eq!(
            dir_a.get_file("file1.txt").unwrap().hash(),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
        assert_eq!(
            sub.get_file("file2.txt").unwrap().relative_path(),
            "sub/file2.txt"
        );
    }

    #[test]
    fn test_write_lines_of_read_tree() {
        // Given
        let mut tree = read_lines(Cursor::new(CACHE)).unwrap();
        tree.sort();

        // When
        let written = write_to_string(&tree);

        // Then
        assert_eq!(written, CACHE);
    }

    #[test]
    fn test_write_lines() {
        // Given
        let mut tree = sample_tree();
        tree.sort();

        // When
        let written = write_to_string(&tree);

        // Then
        assert_eq!(
            written,
            "T 2024-01-15 09:30:00.123 +0000
D empty
D empty/nested
D sub
F h2 sub/with space.txt
F h1 a.txt
F h3 z.txt
"
        );
    }

    #[test]
    fn test_round_trip() {
        // Given
        let tree = sample_tree();
        let mut sorted = tree.clone();
        sorted.sort();

        // When
        let mut read = read_lines(Cursor::new(write_to_string(&tree))).unwrap();
        read.sort();

        // Then
        assert_eq!(read, sorted);
    }

    #[rstest]
    #[case("X something\n")]
    #[case("F hash-without-path\n")]
    #[case("D sub\ngarbage\n")]
    #[case("T yesterday\n")]
    #[case("d lowercase\n")]
    fn test_read_invalid_line(#[case] content: &str) {
        // When
        let result = read_lines(Cursor::new(content));

        // Then
        assert!(matches!(result, Err(Error::Format(_))));
        assert!(matches!(
            read_map_of_hashes(Cursor::new(content)),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_read_skips_empty_lines() {
        let tree = read_lines(Cursor::new("\nD sub\n\nF h1 sub/a.txt\n")).unwrap();
        assert_eq!(tree.get_dir("sub").unwrap().files().len(), 1);
    }

    #[test]
    fn test_read_map_of_hashes() {
        // When
        let cached = read_map_of_hashes(Cursor::new(CACHE)).unwrap();

        // Then
        assert_eq!(cached.time, Some(time()));
        assert_eq!(
            cached.hashes,
            HashMap::from([
                (
                    "sub/dirA/file1.txt".to_string(),
                    "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08".to_string()
                ),
                (
                    "sub/file2.txt".to_string(),
                    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".to_string()
                ),
            ])
        );
    }

    #[test]
    fn test_time_keeps_offset_and_milliseconds() {
        // When
        let parsed = parse_time("2024-01-15 10:30:00.123 +0100").unwrap();

        // Then
        assert_eq!(parsed, time());
        assert_eq!(format_time(&parsed), "2024-01-15 09:30:00.123 +0000");
    }

    #[test]
    fn test_write_and_read_file() {
        // Given
        let file_path = testdir::testdir!().join("content.cache");
        let mut tree = sample_tree();
        tree.sort();

        // When
        write_to_file(&tree, &file_path).unwrap();

        // Then
        let mut read = read_from_file(&file_path).unwrap();
        read.sort();
        assert_eq!(read, tree);
        let cached = read_map_of_hashes_from_file(&file_path).unwrap();
        assert_eq!(cached.time, Some(time()));
        assert_eq!(cached.hashes.len(), 3);
    }
}
