use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use crate::error::FetchError;
use crate::scratch::RequestScratch;

static DOWNLOAD_PREFIX: &str = "temp_";
static DOWNLOAD_EXTENSION: &str = ".mp4";

/// Downloads the best single-file stream with yt-dlp into the request directory
pub async fn download(
    ytdlp: &str,
    url: &str,
    scratch: &RequestScratch,
) -> Result<Vec<PathBuf>, FetchError> {
    let template = scratch.path().join("temp_%(id)s.%(ext)s");

    let output = Command::new(ytdlp)
        .arg("--ignore-config")
        .args(["--format", "best"])
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--output")
        .arg(&template)
        .arg(url)
        .output()
        .await
        .map_err(|e| FetchError::Extractor(format!("could not run {ytdlp}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::Extractor(format!(
            "{ytdlp} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let path = claim_download(scratch).await?;
    info!(path = %path.display(), "downloaded video");
    Ok(vec![path])
}

/// Gives the file yt-dlp produced its sequential scratch name
async fn claim_download(scratch: &RequestScratch) -> Result<PathBuf, FetchError> {
    let downloaded = find_download(scratch.path())
        .await?
        .ok_or_else(|| FetchError::MissingMedia(scratch.path().to_owned()))?;
    let renamed = scratch.next_path("tempVideo", "mp4")?;
    tokio::fs::rename(&downloaded, &renamed).await?;
    Ok(renamed)
}

async fn find_download(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let matches = name
            .to_str()
            .map(|n| n.starts_with(DOWNLOAD_PREFIX) && n.ends_with(DOWNLOAD_EXTENSION))
            .unwrap_or(false);
        if matches {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
