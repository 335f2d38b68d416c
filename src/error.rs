//! Named precondition and propagated failures.
//!
//! Per-item failures (a package with an unreadable manifest, a file whose
//! permissions can't be applied, a blob missing at extract time) are *not*
//! represented here: they're logged with [`tracing::warn!`] at the call
//! site and the surrounding operation continues, per spec.

use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("source dependency tree not found: {0}")]
    SourceNotFound(Utf8PathBuf),

    #[error("snapshot database not found: {0}")]
    DatabaseNotFound(Utf8PathBuf),

    #[error("output already exists: {0} (use --force to overwrite)")]
    OutputExists(Utf8PathBuf),

    #[error("malformed compressed blob: {0}")]
    Decompress(#[from] crate::compressor::DecompressError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("store is closed")]
    Closed,
}
