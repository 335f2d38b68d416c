//! Snapshots a `node_modules` dependency tree into a single content-addressed
//! database file, and restores it bit-identically.
//!
//! The core exposes three verbs - [`pack`], [`unpack`], [`status`] - as a
//! programmatic interface. Argument parsing, progress rendering, and exit
//! codes live in the `ui` module, a thin adapter over this library.

pub mod compressor;
pub mod config;
pub mod error;
pub mod extractor;
pub mod hashing;
pub mod packer;
pub mod progress;
pub mod scanner;
pub mod status;
pub mod store;

pub mod ui;

use std::fs;

use camino::Utf8Path;

pub use error::SnapshotError;
pub use packer::{PackOptions, PackSummary};
pub use progress::ProgressFn;
pub use status::StatusReport;
pub use store::Store;

#[derive(Debug, Clone)]
pub struct UnpackOptions {
    pub database: camino::Utf8PathBuf,
    pub output: camino::Utf8PathBuf,
    pub force: bool,
    /// Decompressed blobs smaller than this are kept in memory for the rest
    /// of the extraction (spec.md S4.6). Defaults to
    /// [`config::DEFAULT_CACHE_THRESHOLD`].
    pub cache_threshold_bytes: u64,
}

impl Default for UnpackOptions {
    fn default() -> Self {
        Self {
            database: camino::Utf8PathBuf::new(),
            output: camino::Utf8PathBuf::new(),
            force: false,
            cache_threshold_bytes: config::DEFAULT_CACHE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackSummary {
    pub total_files: u64,
    pub total_size: u64,
}

#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub database: camino::Utf8PathBuf,
    pub tree: camino::Utf8PathBuf,
}

/// Snapshots `options.source` into `options.output`. Always a fresh
/// snapshot: any existing output (and its `-wal`/`-shm` sidecars) is
/// removed first.
pub fn pack(
    options: &PackOptions,
    progress: Option<&mut ProgressFn<'_>>,
) -> anyhow::Result<PackSummary> {
    packer::pack(options, progress)
}

/// Restores every file recorded in `options.database` under `options.output`.
pub fn unpack(
    options: &UnpackOptions,
    progress: Option<&mut ProgressFn<'_>>,
) -> anyhow::Result<UnpackSummary> {
    if !options.database.is_file() {
        return Err(SnapshotError::DatabaseNotFound(options.database.clone()).into());
    }
    if options.output.exists() && !options.force {
        return Err(SnapshotError::OutputExists(options.output.clone()).into());
    }
    fs::create_dir_all(&options.output)?;

    let store = Store::open(&options.database)?;
    let summary = extractor::unpack_with_cache_threshold(
        &store,
        &options.output,
        options.cache_threshold_bytes as usize,
        progress,
    )?;
    Ok(UnpackSummary {
        total_files: summary.total_files,
        total_size: summary.total_size,
    })
}

/// Diffs `options.database` against the current state of `options.tree`.
pub fn status(options: &StatusOptions) -> anyhow::Result<StatusReport> {
    if !options.database.is_file() {
        return Err(SnapshotError::DatabaseNotFound(options.database.clone()).into());
    }
    let store = Store::open(&options.database)?;
    status::status(&store, &options.tree)
}

/// Resolves a relative path against the current directory the same way the
/// CLI's defaults do, without requiring the path to already exist.
pub(crate) fn absolutize(path: &Utf8Path) -> anyhow::Result<camino::Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let cwd = camino::Utf8PathBuf::from_path_buf(std::env::current_dir()?)
        .map_err(|p| anyhow::anyhow!("current directory isn't UTF-8: {}", p.display()))?;
    Ok(cwd.join(path))
}
