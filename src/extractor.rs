//! Materializes files from a [`Store`] back onto the filesystem.

use std::collections::HashMap;
use std::fs;

use camino::Utf8Path;
use tracing::warn;

use crate::compressor;
use crate::progress::{ProgressFn, report};
use crate::store::Store;

/// Blobs decompressed to fewer than this many bytes are cached in memory
/// across the whole extraction, since small files dominate both the file
/// count and the duplication rate (spec.md S4.6).
pub const CACHE_THRESHOLD_BYTES: usize = 100 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub total_files: u64,
    pub total_size: u64,
}

/// Like [`unpack`], using the default cache threshold
/// ([`CACHE_THRESHOLD_BYTES`]).
pub fn unpack(
    store: &Store,
    output: &Utf8Path,
    progress: Option<&mut ProgressFn<'_>>,
) -> anyhow::Result<UnpackSummary> {
    unpack_with_cache_threshold(store, output, CACHE_THRESHOLD_BYTES, progress)
}

/// Materializes every file `store` knows about under `output`. Decompressed
/// blobs smaller than `cache_threshold` bytes are kept in memory for the
/// rest of the extraction.
pub fn unpack_with_cache_threshold(
    store: &Store,
    output: &Utf8Path,
    cache_threshold: usize,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> anyhow::Result<UnpackSummary> {
    let files = store.get_all_files()?;
    let total = files.len() as u64;
    let mut summary = UnpackSummary::default();
    let mut cache: HashMap<String, Vec<u8>> = HashMap::new();

    for (done, file) in files.iter().enumerate() {
        let target = output.join(&file.package_path).join(&file.relative_path);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = match cache.get(&file.blob_hash) {
            Some(bytes) => bytes.clone(),
            None => match store.get_blob(&file.blob_hash)? {
                Some(compressed) => {
                    let bytes = compressor::decompress(&compressed)?;
                    if bytes.len() < cache_threshold {
                        cache.insert(file.blob_hash.clone(), bytes.clone());
                    }
                    bytes
                }
                None => {
                    warn!(
                        "blob {} missing for {}/{}, skipping",
                        file.blob_hash, file.package_path, file.relative_path
                    );
                    report(
                        progress.as_deref_mut(),
                        done as u64 + 1,
                        total,
                        Some(&file.relative_path),
                    );
                    continue;
                }
            },
        };

        fs::write(&target, &content)?;
        apply_permissions(&target, file.mode);

        summary.total_size += content.len() as u64;
        summary.total_files += 1;
        report(
            progress.as_deref_mut(),
            done as u64 + 1,
            total,
            Some(&file.relative_path),
        );
    }

    Ok(summary)
}

#[cfg(unix)]
fn apply_permissions(path: &Utf8Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    if mode == 0 {
        return;
    }
    let perms = fs::Permissions::from_mode(mode & 0o777);
    if let Err(e) = fs::set_permissions(path, perms) {
        warn!("couldn't set permissions on {}: {}", path, e);
    }
}

#[cfg(not(unix))]
fn apply_permissions(_path: &Utf8Path, _mode: u32) {}
