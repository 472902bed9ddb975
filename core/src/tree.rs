use std::{collections::HashMap, fmt::Display, fmt::Write};

use chrono::{DateTime, Utc};

use crate::{
    cache::DATE_TIME_FORMAT,
    error::Error,
    plan::{EntryKind, Marks},
    utils,
};

/// Something which can be read as a sequence of path elements : a "/"
/// separated relative path or an already split one.
pub trait AsPathElements {
    fn path_elements(&self) -> Vec<String>;
}

impl AsPathElements for str {
    fn path_elements(&self) -> Vec<String> {
        utils::path_elements(self)
    }
}

impl AsPathElements for String {
    fn path_elements(&self) -> Vec<String> {
        utils::path_elements(self)
    }
}

impl AsPathElements for [String] {
    fn path_elements(&self) -> Vec<String> {
        self.to_vec()
    }
}

impl AsPathElements for Vec<String> {
    fn path_elements(&self) -> Vec<String> {
        self.clone()
    }
}

impl AsPathElements for [&str] {
    fn path_elements(&self) -> Vec<String> {
        self.iter().map(|element| element.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    name: String,
    hash: String,
    parent_path_elements: Vec<String>,
}

impl FileContent {
    pub fn new(name: String, hash: String, parent_path_elements: Vec<String>) -> Self {
        Self {
            name,
            hash,
            parent_path_elements,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn parent_path_elements(&self) -> &[String] {
        &self.parent_path_elements
    }

    pub fn relative_path(&self) -> String {
        let mut elements = self.parent_path_elements.clone();
        elements.push(self.name.clone());
        elements.join("/")
    }
}

impl Display for FileContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.hash)
    }
}

/// Directory node of a content tree. The root has no name and is the only
/// node which can carry the time at which the content was captured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContentTree {
    name: Option<String>,
    path_elements: Vec<String>,
    files: Vec<FileContent>,
    dirs: Vec<ContentTree>,
    file_by_name: HashMap<String, usize>,
    dir_by_name: HashMap<String, usize>,
    time: Option<DateTime<Utc>>,
}

impl ContentTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn new_dir(name: &str, parent_path_elements: &[String]) -> Self {
        let mut path_elements = parent_path_elements.to_vec();
        path_elements.push(name.to_string());
        Self {
            name: Some(name.to_string()),
            path_elements,
            ..Default::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path_elements(&self) -> &[String] {
        &self.path_elements
    }

    pub fn relative_path(&self) -> String {
        self.path_elements.join("/")
    }

    pub fn files(&self) -> &[FileContent] {
        &self.files
    }

    pub fn dirs(&self) -> &[ContentTree] {
        &self.dirs
    }

    pub fn get_dir(&self, name: &str) -> Option<&ContentTree> {
        self.dir_by_name.get(name).map(|index| &self.dirs[*index])
    }

    pub fn get_file(&self, name: &str) -> Option<&FileContent> {
        self.file_by_name.get(name).map(|index| &self.files[*index])
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    pub fn set_time(&mut self, time: Option<DateTime<Utc>>) {
        self.time = time;
    }

    fn sub_dir_mut(&mut self, name: &str) -> &mut ContentTree {
        let index = match self.dir_by_name.get(name) {
            Some(index) => *index,
            None => {
                self.dirs.push(ContentTree::new_dir(name, &self.path_elements));
                let index = self.dirs.len() - 1;
                self.dir_by_name.insert(name.to_string(), index);
                index
            }
        };
        &mut self.dirs[index]
    }

    pub fn add_dir<P: AsPathElements + ?Sized>(&mut self, dir_path: &P) {
        self.add_dir_elements(&dir_path.path_elements())
    }

    fn add_dir_elements(&mut self, elements: &[String]) {
        if let Some((path_start, rest_of_path)) = elements.split_first() {
            self.sub_dir_mut(path_start).add_dir_elements(rest_of_path)
        }
    }

    pub fn add_file<P: AsPathElements + ?Sized>(
        &mut self,
        file_path: &P,
        hash: &str,
    ) -> Result<(), Error> {
        let elements = file_path.path_elements();
        if elements.is_empty() {
            return Err(Error::InvalidPath(elements.join("/")));
        }
        self.add_file_elements(&elements, hash);
        Ok(())
    }

    fn add_file_elements(&mut self, elements: &[String], hash: &str) {
        match elements {
            [file_name] => match self.file_by_name.get(file_name) {
                Some(index) => {
                    self.files[*index].hash = hash.to_string();
                }
                None => {
                    self.files.push(FileContent::new(
                        file_name.clone(),
                        hash.to_string(),
                        self.path_elements.clone(),
                    ));
                    self.file_by_name
                        .insert(file_name.clone(), self.files.len() - 1);
                }
            },
            [path_start, rest_of_path @ ..] => self
                .sub_dir_mut(path_start)
                .add_file_elements(rest_of_path, hash),
            [] => {}
        }
    }

    /// Recursively order directories and files by name
    pub fn sort(&mut self) {
        self.dirs.sort_by(|a, b| a.name.cmp(&b.name));
        self.files.sort_by(|a, b| a.name.cmp(&b.name));
        self.dir_by_name = self
            .dirs
            .iter()
            .enumerate()
            .filter_map(|(index, dir)| dir.name.clone().map(|name| (name, index)))
            .collect();
        self.file_by_name = self
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| (file.name.clone(), index))
            .collect();
        for dir in &mut self.dirs {
            dir.sort();
        }
    }

    /// All directory relative paths, parents before children
    pub fn dir_paths(&self) -> Vec<String> {
        let mut paths = vec![];
        for dir in &self.dirs {
            paths.push(dir.relative_path());
            paths.extend(dir.dir_paths());
        }
        paths
    }

    /// All files, as relative path and hash
    pub fn file_hashes(&self) -> Vec<(String, String)> {
        let mut hashes = vec![];
        for dir in &self.dirs {
            hashes.extend(dir.file_hashes());
        }
        for file in &self.files {
            hashes.push((file.relative_path(), file.hash.clone()));
        }
        hashes
    }

    /// Human readable, indented representation, with copy and delete
    /// annotations taken from `marks`.
    pub fn show_indented(&self, marks: &Marks) -> String {
        let mut output = String::new();
        self.write_indented(&mut output, "", "  ", "", marks);
        output
    }

    fn write_indented(
        &self,
        output: &mut String,
        name: &str,
        indent: &str,
        current_indent: &str,
        marks: &Marks,
    ) {
        let relative_path = self.relative_path();
        // Writing into a String can't fail
        if let Some(time) = self.time {
            let _ = writeln!(
                output,
                "{}[TIME: {}]",
                current_indent,
                time.format(DATE_TIME_FORMAT)
            );
        }
        if !name.is_empty() {
            let _ = writeln!(output, "{}{}", current_indent, name);
        }
        if let Some(destination) = marks.copy_destination(EntryKind::Directory, &relative_path) {
            let _ = writeln!(output, "{} [COPY to {}]", current_indent, destination);
        }
        if marks.to_be_deleted(EntryKind::Directory, &relative_path) {
            let _ = writeln!(output, "{} [DELETE]", current_indent);
        }

        let next_indent = format!("{}{}", current_indent, indent);
        for dir in &self.dirs {
            let dir_name = format!("{}/", dir.name().unwrap_or_default());
            dir.write_indented(output, &dir_name, indent, &next_indent, marks);
        }
        for file in &self.files {
            let file_path = file.relative_path();
            let _ = writeln!(output, "{}{}  - {}", next_indent, file.name, file.hash);
            if let Some(destination) = marks.copy_destination(EntryKind::File, &file_path) {
                let _ = writeln!(output, "{} [COPY to {}]", next_indent, destination);
            }
            if marks.to_be_deleted(EntryKind::File, &file_path) {
                let _ = writeln!(output, "{} [DELETE]", next_indent);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::collections::BTreeSet;

    fn build(dirs: &[&str], files: &[(&str, &str)]) -> ContentTree {
        let mut tree = ContentTree::new();
        for dir in dirs {
            tree.add_dir(*dir);
        }
        for (path, hash) in files {
            tree.add_file(*path, hash).unwrap();
        }
        tree
    }

    fn all_paths(tree: &ContentTree) -> BTreeSet<String> {
        tree.dir_paths()
            .into_iter()
            .chain(tree.file_hashes().into_iter().map(|(path, _)| path))
            .collect()
    }

    fn names(tree: &ContentTree) -> (Vec<String>, Vec<String>) {
        (
            tree.dirs()
                .iter()
                .map(|dir| dir.name().unwrap().to_string())
                .collect(),
            tree.files()
                .iter()
                .map(|file| file.name().to_string())
                .collect(),
        )
    }

    #[test]
    fn test_add_dir_creates_intermediate_dirs() {
        // When
        let tree = build(&["a/b/c"], &[]);

        // Then
        let a = tree.get_dir("a").unwrap();
        let b = a.get_dir("b").unwrap();
        let c = b.get_dir("c").unwrap();
        assert_eq!(a.path_elements(), ["a"]);
        assert_eq!(c.path_elements(), ["a", "b", "c"]);
        assert_eq!(c.relative_path(), "a/b/c");
        assert!(tree.name().is_none());
    }

    #[test]
    fn test_add_file_with_elements() {
        // Given
        let mut tree = ContentTree::new();

        // When
        tree.add_file(&["sub", "a.txt"][..], "h1").unwrap();
        tree.add_file(&vec!["sub".to_string(), "b.txt".to_string()], "h2")
            .unwrap();
        tree.add_dir(&["other"][..]);

        // Then
        let sub = tree.get_dir("sub").unwrap();
        assert_eq!(sub.files().len(), 2);
        assert_eq!(sub.get_file("a.txt").unwrap().relative_path(), "sub/a.txt");
        assert_eq!(sub.get_file("b.txt").unwrap().hash(), "h2");
        assert!(tree.get_dir("other").is_some());
    }

    #[rstest]
    #[case("")]
    fn test_add_file_with_empty_path(#[case] path: &str) {
        // Given
        let mut tree = ContentTree::new();

        // When
        let result = tree.add_file(path, "h1");

        // Then
        assert!(matches!(result, Err(Error::InvalidPath(_))));
        let empty: &[&str] = &[];
        assert!(matches!(
            tree.add_file(empty, "h1"),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_names_are_unique() {
        // When
        let tree = build(&["a", "a/b", "a"], &[("a/x.txt", "h1"), ("a/x.txt", "h2")]);

        // Then
        assert_eq!(tree.dirs().len(), 1);
        let a = tree.get_dir("a").unwrap();
        assert_eq!(a.dirs().len(), 1);
        assert_eq!(a.files().len(), 1);
        assert_eq!(a.get_file("x.txt").unwrap().hash(), "h2");
    }

    #[test]
    fn test_paths_independent_of_insertion_order() {
        // Given
        let dirs = ["z", "a/b", "a", "m/n/o"];
        let files = [
            ("z/1.txt", "h1"),
            ("a/b/2.txt", "h2"),
            ("3.txt", "h3"),
            ("m/n/4.txt", "h4"),
        ];
        let mut reversed_dirs = dirs.to_vec();
        reversed_dirs.reverse();
        let mut reversed_files = files.to_vec();
        reversed_files.reverse();

        // When
        let mut tree = build(&dirs, &files);
        let mut reversed_tree = build(&reversed_dirs, &reversed_files);

        // Then
        let expected: BTreeSet<String> = [
            "z", "a", "a/b", "m", "m/n", "m/n/o", "z/1.txt", "a/b/2.txt", "3.txt", "m/n/4.txt",
        ]
        .iter()
        .map(|path| path.to_string())
        .collect();
        assert_eq!(all_paths(&tree), expected);
        assert_eq!(all_paths(&reversed_tree), expected);
        tree.sort();
        reversed_tree.sort();
        assert_eq!(tree, reversed_tree);
    }

    #[test]
    fn test_sort() {
        // Given
        let mut tree = build(
            &["c", "a", "b/z", "b/y"],
            &[("b.txt", "h"), ("a.txt", "h"), ("b/z/2", "h"), ("b/z/1", "h")],
        );

        // When
        tree.sort();

        // Then
        assert_eq!(
            names(&tree),
            (
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                vec!["a.txt".to_string(), "b.txt".to_string()]
            )
        );
        let b = tree.get_dir("b").unwrap();
        assert_eq!(names(b).0, vec!["y".to_string(), "z".to_string()]);
        assert_eq!(
            names(b.get_dir("z").unwrap()).1,
            vec!["1".to_string(), "2".to_string()]
        );
        // Index maps follow new order
        assert_eq!(tree.get_dir("c").unwrap().name(), Some("c"));
        assert_eq!(tree.get_file("b.txt").unwrap().name(), "b.txt");

        // Idempotent
        let sorted_once = tree.clone();
        tree.sort();
        assert_eq!(tree, sorted_once);
    }

    #[test]
    fn test_show_indented() {
        // Given
        let mut tree = build(&["sub"], &[("sub/a.txt", "h1"), ("b.txt", "h2")]);
        tree.sort();

        // When
        let shown = tree.show_indented(&Marks::default());

        // Then
        assert_eq!(shown, "  sub/\n    a.txt  - h1\n  b.txt  - h2\n");
    }

    #[test]
    fn test_file_content_display() {
        let file = FileContent::new("a.txt".to_string(), "h1".to_string(), vec![]);
        assert_eq!(file.to_string(), "a.txt (h1)");
        assert_eq!(file.relative_path(), "a.txt");
    }
}
