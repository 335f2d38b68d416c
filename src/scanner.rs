//! Layout-aware traversal of a dependency tree.
//!
//! Detects whether `node_modules` is laid out flat (plain npm/yarn) or as a
//! pnpm-style symlink farm (a `.pnpm/` directory of per-version subtrees),
//! and emits every package with the regular files under it.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{trace, warn};
use walkdir::WalkDir;

use crate::progress::{ProgressFn, report};

const SKIPPED_TOP_LEVEL: &[&str] = &[".bin", ".cache", ".pnpm"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Relative to the package's own root directory.
    pub relative_path: Utf8PathBuf,
    pub absolute_path: Utf8PathBuf,
    pub mode: u32,
    pub size: u64,
    pub mtime_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageWithFiles {
    pub name: String,
    pub version: String,
    /// The package's location relative to the dependency-tree root,
    /// layout-preserving (spec.md S3).
    pub path: String,
    pub absolute_path: Utf8PathBuf,
    pub files: Vec<ScannedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub packages: Vec<PackageWithFiles>,
    pub total_files: u64,
    pub total_size: u64,
}

/// A package directory discovered during enumeration, before its manifest
/// has been read.
struct Candidate {
    /// Path relative to the tree root (spec.md S4.4's `relativePath`).
    relative_path: String,
    absolute_path: Utf8PathBuf,
}

pub fn scan(root: &Utf8Path, mut progress: Option<&mut ProgressFn<'_>>) -> anyhow::Result<ScanResult> {
    let candidates = if is_symlink_farm(root) {
        enumerate_symlink_farm(root)?
    } else {
        enumerate_flat(root)?
    };

    let total = candidates.len() as u64;
    let mut result = ScanResult::default();

    for (done, candidate) in candidates.into_iter().enumerate() {
        match process_package(&candidate) {
            Some(pkg) => {
                result.total_files += pkg.files.len() as u64;
                result.total_size += pkg.files.iter().map(|f| f.size).sum::<u64>();
                result.packages.push(pkg);
            }
            None => {
                trace!(
                    "skipping {} (no readable package.json)",
                    candidate.relative_path
                );
            }
        }
        report(
            progress.as_deref_mut(),
            done as u64 + 1,
            total,
            Some(&candidate.relative_path),
        );
    }

    Ok(result)
}

/// A tree is a symlink-farm layout iff its root directly contains a child
/// directory literally named `.pnpm`.
fn is_symlink_farm(root: &Utf8Path) -> bool {
    let pnpm = root.join(".pnpm");
    pnpm.is_dir()
}

fn enumerate_flat(root: &Utf8Path) -> anyhow::Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for entry in read_dir_sorted(root)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let path = entry.path_utf8()?;
        if !path.is_dir() {
            continue;
        }
        if SKIPPED_TOP_LEVEL.contains(&name) {
            continue;
        }
        if let Some(scope) = name.strip_prefix('@') {
            for child in read_dir_sorted(&path)? {
                let child_name = child.file_name();
                let Some(child_name) = child_name.to_str() else { continue };
                let child_path = child.path_utf8()?;
                if !child_path.is_dir() {
                    continue;
                }
                candidates.push(Candidate {
                    relative_path: format!("@{scope}/{child_name}"),
                    absolute_path: child_path,
                });
            }
        } else {
            candidates.push(Candidate {
                relative_path: name.to_owned(),
                absolute_path: path,
            });
        }
    }
    Ok(candidates)
}

fn enumerate_symlink_farm(root: &Utf8Path) -> anyhow::Result<Vec<Candidate>> {
    let farm = root.join(".pnpm");
    let mut candidates = Vec::new();

    for entry in read_dir_sorted(&farm)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let entry_path = entry.path_utf8()?;
        if !entry_path.is_dir() {
            continue;
        }
        if name.starts_with('.') || name == "node_modules" {
            continue;
        }

        let pkg_bearing = entry_path.join("node_modules");
        if !pkg_bearing.is_dir() {
            continue;
        }

        for child in read_dir_sorted(&pkg_bearing)? {
            let child_name = child.file_name();
            let Some(child_name) = child_name.to_str() else { continue };
            let child_path = child.path_utf8()?;
            if !child_path.is_dir() {
                continue;
            }
            if let Some(scope) = child_name.strip_prefix('@') {
                for scoped_child in read_dir_sorted(&child_path)? {
                    let scoped_name = scoped_child.file_name();
                    let Some(scoped_name) = scoped_name.to_str() else {
                        continue;
                    };
                    let scoped_path = scoped_child.path_utf8()?;
                    if !scoped_path.is_dir() {
                        continue;
                    }
                    candidates.push(Candidate {
                        relative_path: format!(
                            ".pnpm/{name}/node_modules/@{scope}/{scoped_name}"
                        ),
                        absolute_path: scoped_path,
                    });
                }
            } else {
                candidates.push(Candidate {
                    relative_path: format!(".pnpm/{name}/node_modules/{child_name}"),
                    absolute_path: child_path,
                });
            }
        }
    }
    Ok(candidates)
}

fn process_package(candidate: &Candidate) -> Option<PackageWithFiles> {
    let manifest_path = candidate.absolute_path.join("package.json");
    let manifest_text = fs::read_to_string(&manifest_path).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest_text).ok()?;

    let name = manifest
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_owned();
    let version = manifest
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or("0.0.0")
        .to_owned();

    let files = walk_package_files(&candidate.absolute_path);

    Some(PackageWithFiles {
        name,
        version,
        path: candidate.relative_path.clone(),
        absolute_path: candidate.absolute_path.clone(),
        files,
    })
}

fn walk_package_files(pkg_path: &Utf8Path) -> Vec<ScannedFile> {
    let mut files = Vec::new();
    for entry in WalkDir::new(pkg_path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("couldn't walk {}: {}", pkg_path, e);
                None
            }
        })
    {
        // Symlinks and other special files aren't regular files; skip them.
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(absolute_path) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
            continue;
        };
        let Ok(relative_path) = absolute_path.strip_prefix(pkg_path) else {
            continue;
        };
        let metadata = match fs::symlink_metadata(&absolute_path) {
            Ok(m) => m,
            Err(e) => {
                warn!("couldn't stat {}: {}", absolute_path, e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        files.push(ScannedFile {
            relative_path: relative_path.to_owned(),
            mode: file_mode(&metadata),
            size: metadata.len(),
            mtime_ms: file_mtime_ms(&metadata),
            absolute_path,
        });
    }
    files
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0
}

fn file_mtime_ms(metadata: &fs::Metadata) -> i64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Directory entries in a deterministic (sorted-by-name) order, so a given
/// tree always scans into the same package order.
fn read_dir_sorted(dir: &Utf8Path) -> anyhow::Result<Vec<walkdir::DirEntry>> {
    let mut entries: Vec<walkdir::DirEntry> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by(|a, b| a.file_name().cmp(b.file_name()));
    Ok(entries)
}

trait DirEntryUtf8 {
    fn path_utf8(&self) -> anyhow::Result<Utf8PathBuf>;
}

impl DirEntryUtf8 for walkdir::DirEntry {
    fn path_utf8(&self) -> anyhow::Result<Utf8PathBuf> {
        Utf8PathBuf::from_path_buf(self.path().to_owned())
            .map_err(|p| anyhow::anyhow!("non-UTF-8 path: {}", p.display()))
    }
}
