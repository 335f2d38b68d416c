//! Optional user configuration, loaded from `~/.config/node-archive.toml`.
//!
//! Absence of the file is not an error; every field falls back to a built-in
//! default. This mirrors the CLI's own flag defaults (spec.md S6) so that a
//! config file only needs to override what the user actually cares about.

use std::{fs, io};

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use serde_derive::Deserialize;

/// Default gzip level used by `pack` when `-c`/`--compression` isn't given.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Blobs decompressed to fewer than this many bytes are kept in the
/// extractor's in-memory cache (spec.md S4.6).
pub const DEFAULT_CACHE_THRESHOLD: u64 = 100 * 1024;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub compression_level: u32,
    pub cache_threshold_bytes: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            cache_threshold_bytes: DEFAULT_CACHE_THRESHOLD,
        }
    }
}

/// Loads `~/.config/node-archive.toml`, or the default configuration if it
/// doesn't exist.
pub fn load() -> Result<Configuration> {
    let mut confpath: Utf8PathBuf = home::home_dir()
        .ok_or_else(|| anyhow!("Can't find home directory"))?
        .try_into()
        .context("Home directory isn't UTF-8")?;
    confpath.extend([".config", "node-archive.toml"]);

    let s = match fs::read_to_string(&confpath) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Configuration::default()),
        found => found,
    }
    .with_context(|| format!("Couldn't open {confpath}"))?;

    let conf = toml::from_str(&s).with_context(|| format!("Couldn't parse {confpath}"))?;
    Ok(conf)
}
