use std::path::PathBuf;

use thiserror::Error;

/// Reasons a link could not be turned into downloaded media
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not a valid link: {0}")]
    InvalidUrl(String),
    #[error("could not resolve short link {0}")]
    ShortLink(String),
    #[error("short link resolved to an unexpected host: {0}")]
    UnexpectedHost(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("media extractor failed: {0}")]
    Extractor(String),
    #[error("no media file was produced in {}", .0.display())]
    MissingMedia(PathBuf),
    #[error("no slide download links found in service response")]
    Parse,
    #[error("scratch storage error: {0}")]
    Io(#[from] std::io::Error),
}
