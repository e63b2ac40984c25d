//! Per-run scratch directory and atomic output commits.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use newsreel_common::error::NewsreelResult;
use newsreel_media_model::media::Artifact;
use tempfile::TempDir;

/// Directory holding a run's intermediate files.
///
/// Removed when dropped, unless [`Scratch::preserve`] is called.
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create a hidden scratch directory inside `parent`.
    ///
    /// Living next to the output keeps the final rename on one filesystem.
    pub fn new_in(parent: &Path) -> NewsreelResult<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix(".newsreel-")
            .tempdir_in(parent)?;
        tracing::debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Keep the directory on disk and return its path.
    pub fn preserve(self) -> PathBuf {
        self.dir.keep()
    }
}

/// Hidden sibling of `dest` used while the file is being produced. Keeps the
/// extension so the muxer still picks the right container.
pub fn staging_path(dest: &Path) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match dest.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    dest.with_file_name(name)
}

/// Move `artifact` to `dest`, replacing any existing file.
///
/// The file first lands on a staging sibling and is then renamed, so `dest`
/// never holds a partial file.
pub fn commit(artifact: &Artifact, dest: &Path) -> NewsreelResult<Artifact> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let staging = staging_path(dest);
    if std::fs::rename(&artifact.path, &staging).is_err() {
        // Different filesystem: copy next to the destination first.
        std::fs::copy(&artifact.path, &staging)?;
        std::fs::remove_file(&artifact.path)?;
    }

    if let Err(err) = std::fs::rename(&staging, dest) {
        let _ = std::fs::remove_file(&staging);
        return Err(err.into());
    }

    tracing::debug!(from = %artifact.path.display(), to = %dest.display(), "Committed artifact");
    Ok(artifact.relocated(dest))
}

/// `<output>.report.json`.
pub fn report_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".report.json");
    PathBuf::from(name)
}

/// `<stem>_pip.<ext>` next to `output`.
pub fn pip_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{stem}_pip.{}", ext.to_string_lossy()),
        None => format!("{stem}_pip"),
    };
    output.with_file_name(name)
}
