//! Diffs a snapshot against the current state of a dependency tree by
//! re-hashing every file the snapshot knows about.

use std::fs;

use camino::Utf8Path;
use tracing::warn;

use crate::hashing;
use crate::store::Store;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub only_in_db: Vec<String>,
    pub modified: Vec<String>,
    /// Reserved: a conforming implementation doesn't need to walk the tree
    /// for files present on disk but absent from the snapshot.
    pub only_in_fs: Vec<String>,
    pub unchanged: u64,
}

pub fn status(store: &Store, tree: &Utf8Path) -> anyhow::Result<StatusReport> {
    let mut report = StatusReport::default();

    if !tree.is_dir() {
        warn!("{} doesn't exist, nothing to compare against", tree);
        return Ok(report);
    }

    for file in store.get_all_files()? {
        let joined = format!("{}/{}", file.package_path, file.relative_path);
        let full_path = tree.join(&joined);

        if !full_path.exists() {
            report.only_in_db.push(joined);
            continue;
        }

        match fs::read(&full_path) {
            Ok(bytes) if hashing::hash(&bytes) == file.blob_hash => report.unchanged += 1,
            _ => report.modified.push(joined),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn seed(store: &mut Store, pkg_path: &str, relative_path: &str, contents: &[u8]) {
        let digest = hashing::hash(contents);
        store
            .transaction(|tx| {
                let pkg = tx.insert_package("pkg", "1.0.0", pkg_path)?;
                tx.insert_blob(&digest, contents, contents.len() as u64, contents.len() as u64)?;
                tx.insert_file(pkg, relative_path, &digest, 0o644, 0)?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn unchanged_file_counted_once() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store, "a", "index.js", b"hello");

        let dir = tempdir().unwrap();
        let tree = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(tree.join("a")).unwrap();
        fs::write(tree.join("a").join("index.js"), b"hello").unwrap();

        let report = status(&store, tree).unwrap();
        assert_eq!(report.unchanged, 1);
        assert!(report.modified.is_empty());
        assert!(report.only_in_db.is_empty());
    }

    #[test]
    fn modified_byte_is_reported() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store, "a", "index.js", b"hello");

        let dir = tempdir().unwrap();
        let tree = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(tree.join("a")).unwrap();
        fs::write(tree.join("a").join("index.js"), b"hellO").unwrap();

        let report = status(&store, tree).unwrap();
        assert_eq!(report.modified, vec!["a/index.js".to_string()]);
        assert_eq!(report.unchanged, 0);
    }

    #[test]
    fn deleted_file_is_only_in_db() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store, "a", "index.js", b"hello");

        let dir = tempdir().unwrap();
        let tree = Utf8Path::from_path(dir.path()).unwrap();
        fs::create_dir_all(tree).unwrap();

        let report = status(&store, tree).unwrap();
        assert_eq!(report.only_in_db, vec!["a/index.js".to_string()]);
    }

    #[test]
    fn missing_tree_reports_empty() {
        let mut store = Store::open_in_memory().unwrap();
        seed(&mut store, "a", "index.js", b"hello");

        let report = status(&store, Utf8Path::new("/does/not/exist")).unwrap();
        assert_eq!(report, StatusReport::default());
    }
}
