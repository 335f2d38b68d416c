//! Tools for hashing everything we care about into a content digest.

use std::io;
use std::io::prelude::*;

use data_encoding::HEXLOWER;
use sha2::{Digest as _, Sha256};

/// The lowercase hex-encoded SHA-256 digest used to key every blob.
pub fn hash(bytes: &[u8]) -> String {
    HEXLOWER.encode(&Sha256::digest(bytes))
}

/// Hashes `text` as UTF-8 bytes.
pub fn hash_str(text: &str) -> String {
    hash(text.as_bytes())
}

/// Wraps a reader, hashing everything read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Consumes the reader, returning the hex digest of everything read and
    /// the wrapped reader.
    pub fn finalize(self) -> (String, R) {
        (HEXLOWER.encode(&self.hasher.finalize()), self.inner)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.hasher.update(&buf[..count]);
        Ok(count)
    }
}

/// Wraps a writer, hashing everything written through it.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub fn finalize(self) -> (String, W) {
        (HEXLOWER.encode(&self.hasher.finalize()), self.inner)
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let count = self.inner.write(buf)?;
        self.hasher.update(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
