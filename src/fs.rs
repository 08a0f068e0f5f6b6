//! Blocking filesystem work and the pool it runs on.
//!
//! Every syscall the dumper performs is routed through [`FsPool`] so that
//! general-purpose worker tasks never block on disk. The atomic write
//! protocol lives here as well: write to a `.tmp` sibling, fsync, rename
//! over the destination, fsync the parent directory so the rename itself
//! survives a crash.

use crate::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;

/// Suffix appended to a dump filename while it is being written.
pub const TMP_SUFFIX: &str = ".tmp";

/// Dispatches blocking filesystem work onto a runtime sized for it.
///
/// Callers await the dispatched work; the underlying syscalls cannot be
/// interrupted, so a cancelled caller leaves the filesystem operation
/// running to completion.
#[derive(Debug, Clone)]
pub struct FsPool {
    handle: Handle,
}

impl FsPool {
    /// Wrap an explicit runtime handle.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the current task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Run `work` on the blocking pool and await its completion.
    pub(crate) async fn run<F, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        match self.handle.spawn_blocking(work).await {
            Ok(result) => result,
            Err(err) => Err(Error::Io {
                source: std::io::Error::other(err),
                path: None,
                operation: "spawn_blocking".into(),
            }),
        }
    }
}

/// Path of the temporary sibling used while writing `path`.
pub(crate) fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

/// Atomically replace-or-create `path` with `contents`.
///
/// The bytes are first written and fsynced to a `.tmp` sibling created with
/// `mode` permission bits, then renamed over `path`; the parent directory is
/// fsynced afterwards so that a crash cannot lose the rename. On any failure
/// before the rename the temporary file is unlinked and no trace remains.
/// The parent directory must already exist.
///
/// # Errors
///
/// Returns [`Error::Io`] if any step of the protocol fails.
pub fn write_atomically(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let tmp_path = tmp_sibling(path);

    if let Err(err) = write_tmp(&tmp_path, contents, mode) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::io(err, path, "rename"));
    }

    sync_parent(path)
}

fn write_tmp(tmp_path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options
        .open(tmp_path)
        .map_err(|e| Error::io(e, tmp_path, "create"))?;
    file.write_all(contents)
        .map_err(|e| Error::io(e, tmp_path, "write"))?;
    file.sync_all()
        .map_err(|e| Error::io(e, tmp_path, "sync"))?;
    Ok(())
}

fn sync_parent(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    let dir = File::open(parent).map_err(|e| Error::io(e, parent, "open"))?;
    dir.sync_all().map_err(|e| Error::io(e, parent, "sync"))
}

/// Read the full contents of a file.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(e, path, "read"))
}

/// Rename a file within its filesystem.
pub(crate) fn rename(old_path: &Path, new_path: &Path) -> Result<()> {
    fs::rename(old_path, new_path).map_err(|e| Error::io(e, old_path, "rename"))
}

/// Unlink a file.
pub(crate) fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| Error::io(e, path, "remove"))
}
