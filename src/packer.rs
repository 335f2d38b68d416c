//! Orchestrates Scanner -> Hasher -> Compressor -> Store in one transaction.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::compressor;
use crate::error::SnapshotError;
use crate::hashing;
use crate::progress::{ProgressFn, report};
use crate::scanner::{self, ScannedFile};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct PackOptions {
    pub source: Utf8PathBuf,
    pub output: Utf8PathBuf,
    /// Gzip level, 1-9.
    pub compression_level: u32,
    pub include_lockfile: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackSummary {
    pub packages: u64,
    pub total_files: u64,
    pub original_size: u64,
    pub compressed_size: u64,
    pub deduplicated: u64,
}

/// Bytes read, hashed, and compressed for one file, ready to be handed to
/// the single-threaded writer. The CPU-bound work (read + hash + gzip)
/// happens before this is produced and may run in parallel across files;
/// only the final store writes are serialized through the transaction.
struct PreparedFile<'p> {
    file: &'p ScannedFile,
    digest: String,
    compressed: Vec<u8>,
    original_len: u64,
}

pub fn pack(
    options: &PackOptions,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> anyhow::Result<PackSummary> {
    if !options.source.is_dir() {
        return Err(SnapshotError::SourceNotFound(options.source.clone()).into());
    }
    let source = options
        .source
        .canonicalize_utf8()
        .map_err(|_| SnapshotError::SourceNotFound(options.source.clone()))?;
    let output = crate::absolutize(&options.output)?;

    let scan = scanner::scan(&source, progress.as_deref_mut())?;
    info!(
        "scanned {} packages, {} files, {} bytes",
        scan.packages.len(),
        scan.total_files,
        scan.total_size
    );

    remove_snapshot_and_sidecars(&output)?;

    let mut store = Store::open(&output)?;
    store.set_metadata("created_at", &now_iso8601())?;
    store.set_metadata("node_version", &format!("node-archive/{}", env!("CARGO_PKG_VERSION")))?;
    store.set_metadata("source_path", source.as_str())?;

    if options.include_lockfile {
        if let Some(parent) = source.parent() {
            let lockfile = parent.join("package-lock.json");
            if let Ok(contents) = fs::read_to_string(&lockfile) {
                store.set_metadata("lockfile_hash", &hashing::hash_str(&contents))?;
                debug!("recorded lockfile hash from {}", lockfile);
            }
        }
    }

    let mut summary = PackSummary {
        packages: scan.packages.len() as u64,
        ..Default::default()
    };

    let level = options.compression_level;
    let total_files = scan.total_files;
    let mut files_done = 0u64;

    store.transaction(|tx| {
        for pkg in &scan.packages {
            let package_id = tx.insert_package(&pkg.name, &pkg.version, &pkg.path)?;

            // Hash + compress every file in this package in parallel; the
            // single writer below stays serial. A read failure here is an
            // IoError and propagates out of the transaction (spec.md S7),
            // aborting the whole pack rather than producing an incomplete
            // snapshot.
            let prepared: Vec<PreparedFile<'_>> = pkg
                .files
                .par_iter()
                .map(|file| {
                    let bytes = fs::read(&file.absolute_path)?;
                    let digest = hashing::hash(&bytes);
                    let compressed = compressor::compress(&bytes, level);
                    Ok::<_, SnapshotError>(PreparedFile {
                        file,
                        digest,
                        original_len: bytes.len() as u64,
                        compressed,
                    })
                })
                .collect::<Result<Vec<_>, SnapshotError>>()?;

            for p in prepared {
                if tx.has_blob(&p.digest)? {
                    summary.deduplicated += 1;
                } else {
                    tx.insert_blob(&p.digest, &p.compressed, p.original_len, p.compressed.len() as u64)?;
                }
                tx.insert_file(
                    package_id,
                    p.file.relative_path.as_str(),
                    &p.digest,
                    p.file.mode,
                    p.file.mtime_ms,
                )?;

                summary.original_size += p.original_len;
                summary.compressed_size += p.compressed.len() as u64;
                files_done += 1;
                report(
                    progress.as_deref_mut(),
                    files_done,
                    total_files,
                    Some(p.file.relative_path.as_str()),
                );
            }
        }
        Ok(())
    })?;

    store.close();
    summary.total_files = files_done;
    Ok(summary)
}

/// Pack is always a fresh snapshot: remove any existing output and its WAL
/// sidecars before opening.
fn remove_snapshot_and_sidecars(output: &Utf8Path) -> anyhow::Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let path = format!("{output}{suffix}");
        if fs::metadata(&path).is_ok() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn now_iso8601() -> String {
    jiff::Timestamp::now().to_string()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_package(root: &Utf8Path, rel: &str, name: &str, version: &str, files: &[(&str, &str)]) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("package.json"),
            format!(r#"{{"name":"{name}","version":"{version}"}}"#),
        )
        .unwrap();
        for (path, contents) in files {
            fs::write(dir.join(path), contents).unwrap();
        }
    }

    #[test]
    fn basic_pack() {
        let src_dir = tempdir().unwrap();
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        write_package(src, "a", "a", "1.0.0", &[("index.js", "hello")]);

        let out_dir = tempdir().unwrap();
        let output = Utf8Path::from_path(out_dir.path()).unwrap().join("snap.db");

        let summary = pack(
            &PackOptions {
                source: src.to_owned(),
                output: output.clone(),
                compression_level: 6,
                include_lockfile: false,
            },
            None,
        )
        .unwrap();

        assert_eq!(summary.packages, 1);
        assert_eq!(summary.total_files, 1);
        assert_eq!(summary.deduplicated, 0);

        let store = Store::open(&output).unwrap();
        assert_eq!(store.get_total_file_count().unwrap(), 1);
        let files = store.get_all_files().unwrap();
        assert_eq!(files[0].blob_hash, hashing::hash(b"hello"));
    }

    #[test]
    fn deduplicates_identical_contents() {
        let src_dir = tempdir().unwrap();
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        write_package(src, "a", "a", "1.0.0", &[("x.js", "same")]);
        write_package(src, "b", "b", "1.0.0", &[("x.js", "same")]);

        let out_dir = tempdir().unwrap();
        let output = Utf8Path::from_path(out_dir.path()).unwrap().join("snap.db");

        let summary = pack(
            &PackOptions {
                source: src.to_owned(),
                output: output.clone(),
                compression_level: 6,
                include_lockfile: false,
            },
            None,
        )
        .unwrap();

        assert!(summary.deduplicated >= 1);
        let store = Store::open(&output).unwrap();
        assert_eq!(store.get_blob_stats().unwrap().count, 1);
    }

    #[test]
    fn missing_source_fails() {
        let out_dir = tempdir().unwrap();
        let output = Utf8Path::from_path(out_dir.path()).unwrap().join("snap.db");
        let result = pack(
            &PackOptions {
                source: "/does/not/exist/node_modules".into(),
                output,
                compression_level: 6,
                include_lockfile: false,
            },
            None,
        );
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_aborts_pack() {
        use std::os::unix::fs::PermissionsExt;

        let src_dir = tempdir().unwrap();
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        write_package(src, "a", "a", "1.0.0", &[("index.js", "hello")]);
        let unreadable = src.join("a").join("index.js");
        fs::set_permissions(&unreadable, fs::Permissions::from_mode(0o000)).unwrap();

        let out_dir = tempdir().unwrap();
        let output = Utf8Path::from_path(out_dir.path()).unwrap().join("snap.db");

        let result = pack(
            &PackOptions {
                source: src.to_owned(),
                output: output.clone(),
                compression_level: 6,
                include_lockfile: false,
            },
            None,
        );

        // Restore permissions so the tempdir can clean itself up.
        fs::set_permissions(&unreadable, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(result.is_err());
        assert!(!output.exists(), "a failed pack should leave no snapshot behind");
    }

    #[test]
    fn repacking_overwrites_cleanly() {
        let src_dir = tempdir().unwrap();
        let src = Utf8Path::from_path(src_dir.path()).unwrap();
        write_package(src, "a", "a", "1.0.0", &[("index.js", "v1")]);

        let out_dir = tempdir().unwrap();
        let output = Utf8Path::from_path(out_dir.path()).unwrap().join("snap.db");

        let opts = PackOptions {
            source: src.to_owned(),
            output: output.clone(),
            compression_level: 6,
            include_lockfile: false,
        };
        pack(&opts, None).unwrap();

        fs::remove_dir_all(src.join("a")).unwrap();
        write_package(src, "a", "a", "2.0.0", &[("index.js", "v2")]);
        pack(&opts, None).unwrap();

        assert!(!Utf8Path::new(&format!("{output}-wal")).exists());
        assert!(!Utf8Path::new(&format!("{output}-shm")).exists());

        let store = Store::open(&output).unwrap();
        let files = store.get_all_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].blob_hash, hashing::hash(b"v2"));
    }
}
