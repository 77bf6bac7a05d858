//! Baseline persistence and cross-platform change detection.
//!
//! Baselines live on the filesystem under the configured output directory:
//! - `<percent-encoded name>.<platform>.hash`: content hash, opaque text
//! - `<percent-encoded name>.<platform>.<idx>.<state>.png`: pixel baseline
//!   (hash-gated mode; the always-diff mode omits the platform segment)
//! - `<percent-encoded name>.<platform>.<idx>.<state>.diff.png`: review
//!   composite written when a capture differs from its stored baseline
//!
//! Screenshots are platform-dependent even for byte-identical markup, so
//! pixel work is gated behind a cheap, platform-independent content hash of
//! the fully assembled document. Missing files are the normal "no baseline
//! yet" case and read as `None`, never as an error. Baselines are only ever
//! overwritten, never deleted.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::capture::types::{CaptureManifest, CaptureResult, Platform, State};

/// Per-platform change/update decision for one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeCheck {
    /// Platform this check describes
    pub platform: Platform,
    /// Stored hash differs from the new content hash
    pub changed: bool,
    /// Stored hash was (re)written during this check
    pub updated: bool,
}

/// Filesystem-backed baseline storage for one output directory
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    /// Create a store rooted at `dir` (not created until first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory this store writes into
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic content hash of the fully assembled document.
    ///
    /// State-independent by construction: it is a function of the
    /// CSS-inlined document string only, never of captured pixels.
    pub fn content_hash(document: &str) -> String {
        format!("{:08x}", crc32fast::hash(document.as_bytes()))
    }

    /// Path of the stored content hash for `(name, platform)`
    pub fn hash_path(&self, name: &str, platform: Platform) -> PathBuf {
        self.dir
            .join(format!("{}.{}.hash", encode(name), platform.as_str()))
    }

    /// Path of a pixel baseline. Hash-gated mode includes the platform in
    /// the name; the always-diff mode passes `None` and omits it.
    pub fn image_path(
        &self,
        name: &str,
        platform: Option<Platform>,
        idx: usize,
        state: State,
    ) -> PathBuf {
        let file = match platform {
            Some(p) => format!("{}.{}.{}.{}.png", encode(name), p.as_str(), idx, state.as_str()),
            None => format!("{}.{}.{}.png", encode(name), idx, state.as_str()),
        };
        self.dir.join(file)
    }

    /// Path of a diff artifact for human review
    pub fn diff_path(&self, name: &str, platform: Platform, idx: usize, state: State) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.{}.{}.diff.png",
            encode(name),
            platform.as_str(),
            idx,
            state.as_str()
        ))
    }

    /// Path of the metadata sidecar for `(name, platform)`
    pub fn manifest_path(&self, name: &str, platform: Platform) -> PathBuf {
        self.dir
            .join(format!("{}.{}.json", encode(name), platform.as_str()))
    }

    /// Write the metadata sidecar describing a baseline refresh
    pub fn write_manifest(&self, manifest: &CaptureManifest) -> CaptureResult<()> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(manifest)?;
        fs::write(self.manifest_path(&manifest.name, manifest.platform), json)?;
        Ok(())
    }

    /// Read a stored content hash; missing file is `None`
    pub fn read_hash(&self, name: &str, platform: Platform) -> CaptureResult<Option<String>> {
        read_optional(&self.hash_path(name, platform))
            .map(|bytes| bytes.map(|b| String::from_utf8_lossy(&b).trim().to_string()))
    }

    /// Overwrite the stored content hash for `(name, platform)`
    pub fn write_hash(&self, name: &str, platform: Platform, hash: &str) -> CaptureResult<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.hash_path(name, platform), hash)?;
        Ok(())
    }

    /// Read a stored pixel baseline or diff artifact; missing file is `None`
    pub fn read_image(&self, path: &Path) -> CaptureResult<Option<Vec<u8>>> {
        read_optional(path)
    }

    /// Write pixels, unconditionally overwriting any previous file
    pub fn write_image(&self, path: &Path, png: &[u8]) -> CaptureResult<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(path, png)?;
        Ok(())
    }

    /// Decide, per configured platform, whether content changed and whether
    /// that platform's stored hash should be overwritten.
    ///
    /// Only `current`'s baseline is ever written: a run can only vouch for
    /// pixels it actually rendered. `updated` is true for the current
    /// platform on first run (no stored hash) or on a forced update, and the
    /// new hash is persisted immediately in that case.
    pub fn check_platforms(
        &self,
        name: &str,
        new_hash: &str,
        platforms: &[Platform],
        force_update: bool,
        current: Platform,
    ) -> CaptureResult<Vec<ChangeCheck>> {
        let mut checks = Vec::with_capacity(platforms.len());

        for &platform in platforms {
            let stored = self.read_hash(name, platform)?;
            let changed = stored.as_deref() != Some(new_hash);
            let updated = platform == current && (force_update || stored.is_none());

            if updated {
                self.write_hash(name, platform, new_hash)?;
            }

            checks.push(ChangeCheck {
                platform,
                changed,
                updated,
            });
        }

        Ok(checks)
    }
}

fn encode(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

fn read_optional(path: &Path) -> CaptureResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
