use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared directory that downloads are staged in before being forwarded
#[derive(Debug, Clone)]
pub struct ScratchRoot {
    root: PathBuf,
}

impl ScratchRoot {
    /// Opens the scratch root, creating it if it doesn't exist yet. Request
    /// directories left over from a previous run are removed.
    pub async fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_request_dir = entry.file_type().await?.is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| Uuid::try_parse(name).is_ok());
            if !is_request_dir {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => warn!(dir = %entry.path().display(), "removed stale scratch directory"),
                Err(e) => error!(dir = %entry.path().display(), "error removing stale scratch directory: {e}"),
            }
        }

        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh directory owned by a single request
    pub async fn request(&self) -> io::Result<RequestScratch> {
        let dir = self.root.join(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir(&dir).await?;
        Ok(RequestScratch::new(dir))
    }
}

/// Scratch directory of one request. Nothing else writes into it, so
/// sequence numbers picked by scanning it can't race with other requests.
///
/// The directory is removed by [`RequestScratch::close`], or when the value is
/// dropped without being closed (a cancelled or panicking request).
#[derive(Debug)]
pub struct RequestScratch {
    dir: PathBuf,
    closed: bool,
}

impl RequestScratch {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn next_path(&self, prefix: &str, extension: &str) -> io::Result<PathBuf> {
        Ok(self.dir.join(next_file_name(&self.dir, prefix, extension)?))
    }

    /// Removes the directory and anything left in it
    pub async fn close(mut self) {
        self.closed = true;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(dir = %self.dir.display(), "error removing scratch directory: {e}"),
        }
    }
}

impl Drop for RequestScratch {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => warn!(dir = %self.dir.display(), "scratch directory removed on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => error!(dir = %self.dir.display(), "error removing scratch directory: {e}"),
        }
    }
}

/// Next unused `{prefix}_{NNN}.{extension}` name in `dir`
pub fn next_file_name(dir: &Path, prefix: &str, extension: &str) -> io::Result<String> {
    let mut max = 0u32;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name();
        if let Some(n) = name.to_str().and_then(|n| sequence_number(n, prefix, extension)) {
            max = max.max(n);
        }
    }
    Ok(format!("{prefix}_{:03}.{extension}", max + 1))
}

fn sequence_number(name: &str, prefix: &str, extension: &str) -> Option<u32> {
    name.strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(extension)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Deletes staged files, logging instead of failing
pub async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => info!(path = %path.display(), "file deleted"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "file already gone")
            }
            Err(e) => error!(path = %path.display(), "error deleting file: {e}"),
        }
    }
}
