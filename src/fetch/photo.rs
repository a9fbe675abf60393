use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::error::FetchError;
use crate::scratch::RequestScratch;

// href in either quote style, link text optionally wrapped in one element
static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>\s*(?:<[^>/][^>]*>)?([^<]*)(?:</[^>]+>)?\s*</a\s*>"#,
    )
    .unwrap()
});

static SLIDE_LINK_TEXT: &str = "Download this slide";
static BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const SERVICE_TIMEOUT: Duration = Duration::from_secs(15);
const SLIDE_TIMEOUT: Duration = Duration::from_secs(30);

/// Third-party service that hands out unwatermarked slide images
#[derive(Debug, Clone)]
pub struct PhotoService {
    pub endpoint: String,
    pub origin: String,
}

impl PhotoService {
    /// Downloads every slide of a photo post, in order
    pub async fn download(
        &self,
        client: &Client,
        url: &str,
        scratch: &RequestScratch,
    ) -> Result<Vec<PathBuf>, FetchError> {
        let html = client
            .post(&self.endpoint)
            .headers(browser_headers())
            .form(&[("id", url), ("locale", "en"), ("tt", "0")])
            .timeout(SERVICE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let links = slide_links(&html, &self.origin);
        if links.is_empty() {
            error!(%url, "no image urls found for photo post");
            return Err(FetchError::Parse);
        }

        let mut paths = Vec::with_capacity(links.len());
        for (idx, link) in links.iter().enumerate() {
            let path = scratch.next_path("tempPhoto", "png")?;
            download_file(client, link, &path).await?;
            info!(slide = idx + 1, path = %path.display(), "downloaded photo");
            paths.push(path);
        }

        Ok(paths)
    }
}

fn browser_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(BROWSER_USER_AGENT),
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers
}

/// Absolute urls of the "Download this slide" anchors in `html`
fn slide_links(html: &str, origin: &str) -> Vec<String> {
    ANCHOR_RE
        .captures_iter(html)
        .filter(|c| c[3].contains(SLIDE_LINK_TEXT))
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|href| href.as_str().replace("&amp;", "&"))
        .map(|href| {
            if href.starts_with("http") {
                href
            } else {
                let origin = origin.trim_end_matches('/');
                let href = href.trim_start_matches('/');
                format!("{origin}/{href}")
            }
        })
        .collect()
}

async fn download_file(client: &Client, url: &str, path: &Path) -> Result<(), FetchError> {
    let mut response = client
        .get(url)
        .headers(browser_headers())
        .timeout(SLIDE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = tokio::fs::File::create(path).await?;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}
