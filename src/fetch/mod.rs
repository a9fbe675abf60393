mod photo;
mod resolve;
mod video;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{error, info};

pub use photo::PhotoService;
pub use resolve::resolve_short_link;

use crate::config::Config;
use crate::error::FetchError;
use crate::link::{is_short_link, is_tiktok_host, ContentKind};
use crate::scratch::{RequestScratch, ScratchRoot};

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Media staged on disk for a single request
#[derive(Debug)]
pub struct DownloadedMedia {
    pub kind: ContentKind,
    pub files: Vec<PathBuf>,
    pub scratch: RequestScratch,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<DownloadedMedia, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub ytdlp: String,
    pub photo_service: PhotoService,
    pub resolve_timeout: Duration,
}

impl From<&Config> for FetchSettings {
    fn from(config: &Config) -> Self {
        Self {
            ytdlp: config.ytdlp_path.clone(),
            photo_service: PhotoService {
                endpoint: config.photo_service_url.clone(),
                origin: config.photo_service_origin.clone(),
            },
            resolve_timeout: RESOLVE_TIMEOUT,
        }
    }
}

/// Downloads TikTok videos and photo posts into scratch storage
pub struct Fetcher {
    client: Client,
    scratch: ScratchRoot,
    settings: FetchSettings,
}

impl Fetcher {
    pub fn new(client: Client, scratch: ScratchRoot, settings: FetchSettings) -> Self {
        Self {
            client,
            scratch,
            settings,
        }
    }

    /// Expands short links and rejects anything that doesn't land on TikTok
    async fn canonical_url(&self, text: &str) -> Result<Url, FetchError> {
        let raw = text.split_whitespace().next().unwrap_or_default();
        let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
        if !is_short_link(&url) {
            return Ok(url);
        }

        let resolved =
            resolve_short_link(&self.client, &url, self.settings.resolve_timeout).await?;
        if !is_tiktok_host(&resolved) {
            return Err(FetchError::UnexpectedHost(resolved.to_string()));
        }
        Ok(resolved)
    }

    async fn download(
        &self,
        kind: ContentKind,
        url: &Url,
        scratch: &RequestScratch,
    ) -> Result<Vec<PathBuf>, FetchError> {
        match kind {
            ContentKind::Video => video::download(&self.settings.ytdlp, url.as_str(), scratch).await,
            ContentKind::PhotoSet => {
                self.settings
                    .photo_service
                    .download(&self.client, url.as_str(), scratch)
                    .await
            }
        }
    }

    async fn fetch_content(&self, text: &str) -> Result<DownloadedMedia, FetchError> {
        let url = self.canonical_url(text).await?;
        let kind = ContentKind::of(url.as_str());
        let scratch = self.scratch.request().await?;

        match self.download(kind, &url, &scratch).await {
            Ok(files) => {
                info!(%url, ?kind, count = files.len(), "downloaded content");
                Ok(DownloadedMedia {
                    kind,
                    files,
                    scratch,
                })
            }
            Err(e) => {
                scratch.close().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MediaSource for Fetcher {
    async fn fetch(&self, url: &str) -> Result<DownloadedMedia, FetchError> {
        self.fetch_content(url).await.map_err(|e| {
            error!(%url, "error downloading TikTok content: {e}");
            e
        })
    }
}
