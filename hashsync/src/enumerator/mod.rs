use chrono::{DurationRound, Utc};
use hashsync_core::{error::Error, hash::RelativePathWithHash, tree::ContentTree};
use mockall::automock;

pub mod local;
pub mod remote;

/// List the directories and file hashes of a base directory. Paths are
/// relative to the base directory and "/" separated.
#[automock]
pub trait ContentEnumerator {
    fn list_directories(&self) -> Result<Vec<String>, Error>;
    fn list_file_hashes(&self) -> Result<Vec<RelativePathWithHash>, Error>;
}

/// Build the sorted tree of what `enumerator` lists. Tree time is taken before
/// listing, so that it precedes anything recorded in the tree.
pub fn enumerate_content_tree(enumerator: &dyn ContentEnumerator) -> Result<ContentTree, Error> {
    let mut tree = ContentTree::new();
    let now = Utc::now();
    tree.set_time(Some(
        now.duration_trunc(chrono::Duration::milliseconds(1))
            .unwrap_or(now),
    ));

    for dir_path in enumerator.list_directories()? {
        tree.add_dir(&dir_path);
    }
    for file in enumerator.list_file_hashes()? {
        tree.add_file(file.relative_path(), file.hash())?;
    }

    tree.sort();
    Ok(tree)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_enumerate_content_tree() {
        // Given
        let mut enumerator = MockContentEnumerator::new();
        enumerator
            .expect_list_directories()
            .times(1)
            .returning(|| Ok(vec!["z".to_string(), "a/b".to_string()]));
        enumerator.expect_list_file_hashes().times(1).returning(|| {
            Ok(vec![
                RelativePathWithHash::new("z/1.txt".to_string(), "h1".to_string()),
                RelativePathWithHash::new("0.txt".to_string(), "h0".to_string()),
            ])
        });
        let before = Utc::now() - chrono::Duration::milliseconds(1);

        // When
        let tree = enumerate_content_tree(&enumerator).unwrap();

        // Then
        assert_eq!(tree.dir_paths(), vec!["a", "a/b", "z"]);
        assert_eq!(
            tree.file_hashes(),
            vec![
                ("z/1.txt".to_string(), "h1".to_string()),
                ("0.txt".to_string(), "h0".to_string())
            ]
        );
        assert!(tree.time().unwrap() >= before);
        assert!(tree.time().unwrap() <= Utc::now());
    }

    #[test]
    fn test_enumerate_fails_on_empty_file_path() {
        // Given
        let mut enumerator = MockContentEnumerator::new();
        enumerator
            .expect_list_directories()
            .returning(|| Ok(vec![]));
        enumerator.expect_list_file_hashes().returning(|| {
            Ok(vec![RelativePathWithHash::new(
                "".to_string(),
                "h1".to_string(),
            )])
        });

        // When
        let result = enumerate_content_tree(&enumerator);

        // Then
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }
}
