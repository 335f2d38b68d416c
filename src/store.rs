//! Transactional content-addressed storage over an embedded SQL database.
//!
//! [`Store`] owns the database handle, the schema, and every operation spec'd
//! out for it. It has a single exclusive writer; read-only consumers
//! ([`crate::extractor`], [`crate::status`]) need no coordination because
//! `pack` always runs to completion before `unpack` or `status` opens the
//! same file.

use camino::Utf8Path;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::SnapshotError;

pub const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT
);
CREATE TABLE IF NOT EXISTS packages (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name    TEXT NOT NULL,
    version TEXT NOT NULL,
    path    TEXT NOT NULL,
    UNIQUE(name, version, path)
);
CREATE TABLE IF NOT EXISTS blobs (
    hash            TEXT PRIMARY KEY,
    content         BLOB NOT NULL,
    original_size   INTEGER,
    compressed_size INTEGER
);
CREATE TABLE IF NOT EXISTS files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id    INTEGER REFERENCES packages(id),
    relative_path TEXT NOT NULL,
    blob_hash     TEXT REFERENCES blobs(hash),
    mode          INTEGER,
    mtime         INTEGER,
    UNIQUE(package_id, relative_path)
);
CREATE INDEX IF NOT EXISTS files_package_id ON files(package_id);
CREATE INDEX IF NOT EXISTS files_blob_hash ON files(blob_hash);
";

/// A file row joined with its owning package's path, as returned by
/// [`Store::get_all_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub package_path: String,
    pub relative_path: String,
    pub blob_hash: String,
    pub mode: u32,
    pub mtime: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobStats {
    pub count: u64,
    pub total_original: u64,
    pub total_compressed: u64,
}

pub struct Store {
    conn: Option<Connection>,
}

impl Store {
    /// Opens (creating if absent) the snapshot database at `path`,
    /// ensuring the schema exists and `schema_version` is recorded.
    pub fn open(path: &Utf8Path) -> Result<Self, SnapshotError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory database. Used by tests.
    pub fn open_in_memory() -> Result<Self, SnapshotError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SnapshotError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        set_metadata(&conn, "schema_version", SCHEMA_VERSION)?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&self) -> Result<&Connection, SnapshotError> {
        self.conn.as_ref().ok_or(SnapshotError::Closed)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        set_metadata(self.conn()?, key, value)
    }

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        get_metadata(self.conn()?, key)
    }

    pub fn has_blob(&self, digest: &str) -> Result<bool, SnapshotError> {
        has_blob(self.conn()?, digest)
    }

    pub fn get_blob(&self, digest: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
        get_blob(self.conn()?, digest)
    }

    pub fn get_all_files(&self) -> Result<Vec<FileRow>, SnapshotError> {
        get_all_files(self.conn()?)
    }

    pub fn get_total_file_count(&self) -> Result<i64, SnapshotError> {
        get_total_file_count(self.conn()?)
    }

    pub fn get_blob_stats(&self) -> Result<BlobStats, SnapshotError> {
        get_blob_stats(self.conn()?)
    }

    /// Runs `f` inside a single database write transaction. `f`'s return
    /// value is forwarded; any error aborts and rolls the transaction back.
    pub fn transaction<T>(
        &mut self,
        f: impl FnOnce(&StoreTransaction) -> Result<T, SnapshotError>,
    ) -> Result<T, SnapshotError> {
        let conn = self.conn.as_mut().ok_or(SnapshotError::Closed)?;
        let tx = conn.transaction()?;
        let wrapped = StoreTransaction { tx };
        let result = f(&wrapped)?;
        wrapped.tx.commit()?;
        Ok(result)
    }

    /// Releases the database handle. Subsequent operations fail with
    /// [`SnapshotError::Closed`].
    pub fn close(&mut self) {
        debug!("closing store");
        self.conn = None;
    }
}

/// A handle to an in-progress write transaction, handed to the closure
/// passed to [`Store::transaction`].
pub struct StoreTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl StoreTransaction<'_> {
    /// Upsert semantics: returns the existing id when the unique
    /// `(name, version, path)` triple already exists.
    pub fn insert_package(&self, name: &str, version: &str, path: &str) -> Result<i64, SnapshotError> {
        insert_package(&self.tx, name, version, path)
    }

    pub fn has_blob(&self, digest: &str) -> Result<bool, SnapshotError> {
        has_blob(&self.tx, digest)
    }

    /// Insert-or-ignore: a second insert with the same digest is a no-op.
    pub fn insert_blob(
        &self,
        digest: &str,
        compressed: &[u8],
        original_len: u64,
        compressed_len: u64,
    ) -> Result<(), SnapshotError> {
        insert_blob(&self.tx, digest, compressed, original_len, compressed_len)
    }

    /// Upsert by `(package_id, relative_path)`; on conflict the blob
    /// reference, mode, and mtime are overwritten.
    pub fn insert_file(
        &self,
        package_id: i64,
        relative_path: &str,
        blob_hash: &str,
        mode: u32,
        mtime: i64,
    ) -> Result<(), SnapshotError> {
        insert_file(&self.tx, package_id, relative_path, blob_hash, mode, mtime)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<(), SnapshotError> {
        set_metadata(&self.tx, key, value)
    }
}

fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<(), SnapshotError> {
    conn.prepare_cached("REPLACE INTO metadata(key, value) VALUES (?1, ?2)")?
        .execute(params![key, value])?;
    Ok(())
}

fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>, SnapshotError> {
    let value = conn
        .prepare_cached("SELECT value FROM metadata WHERE key = ?1")?
        .query_row(params![key], |r| r.get(0))
        .optional()?;
    Ok(value)
}

fn insert_package(conn: &Connection, name: &str, version: &str, path: &str) -> Result<i64, SnapshotError> {
    let id = conn
        .prepare_cached(
            "INSERT INTO packages(name, version, path) VALUES (?1, ?2, ?3)
             ON CONFLICT(name, version, path) DO UPDATE SET name = excluded.name
             RETURNING id",
        )?
        .query_row(params![name, version, path], |r| r.get(0))?;
    Ok(id)
}

fn has_blob(conn: &Connection, digest: &str) -> Result<bool, SnapshotError> {
    let found: Option<i64> = conn
        .prepare_cached("SELECT 1 FROM blobs WHERE hash = ?1")?
        .query_row(params![digest], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn insert_blob(
    conn: &Connection,
    digest: &str,
    compressed: &[u8],
    original_len: u64,
    compressed_len: u64,
) -> Result<(), SnapshotError> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO blobs(hash, content, original_size, compressed_size)
         VALUES (?1, ?2, ?3, ?4)",
    )?
    .execute(params![
        digest,
        compressed,
        original_len as i64,
        compressed_len as i64
    ])?;
    Ok(())
}

fn get_blob(conn: &Connection, digest: &str) -> Result<Option<Vec<u8>>, SnapshotError> {
    let content = conn
        .prepare_cached("SELECT content FROM blobs WHERE hash = ?1")?
        .query_row(params![digest], |r| r.get(0))
        .optional()?;
    Ok(content)
}

fn insert_file(
    conn: &Connection,
    package_id: i64,
    relative_path: &str,
    blob_hash: &str,
    mode: u32,
    mtime: i64,
) -> Result<(), SnapshotError> {
    conn.prepare_cached(
        "INSERT INTO files(package_id, relative_path, blob_hash, mode, mtime)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(package_id, relative_path) DO UPDATE SET
            blob_hash = excluded.blob_hash,
            mode = excluded.mode,
            mtime = excluded.mtime",
    )?
    .execute(params![package_id, relative_path, blob_hash, mode, mtime])?;
    Ok(())
}

fn get_all_files(conn: &Connection) -> Result<Vec<FileRow>, SnapshotError> {
    let mut stmt = conn.prepare(
        "SELECT p.path, f.relative_path, f.blob_hash, f.mode, f.mtime
         FROM files f JOIN packages p ON f.package_id = p.id",
    )?;
    let rows = stmt
        .query_map((), |r| {
            Ok(FileRow {
                package_path: r.get(0)?,
                relative_path: r.get(1)?,
                blob_hash: r.get(2)?,
                mode: r.get(3)?,
                mtime: r.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn get_total_file_count(conn: &Connection) -> Result<i64, SnapshotError> {
    let count = conn.query_row("SELECT COUNT(*) FROM files", (), |r| r.get(0))?;
    Ok(count)
}

fn get_blob_stats(conn: &Connection) -> Result<BlobStats, SnapshotError> {
    let (count, total_original, total_compressed) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(original_size), 0), COALESCE(SUM(compressed_size), 0)
         FROM blobs",
        (),
        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
    )?;
    Ok(BlobStats {
        count: count as u64,
        total_original: total_original as u64,
        total_compressed: total_compressed as u64,
    })
}
