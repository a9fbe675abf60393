use std::time::Duration;

use reqwest::{Client, Url};
use tracing::{error, info};

use crate::error::FetchError;
use crate::link::is_short_link;

/// Expands a short link by following its redirects
pub async fn resolve_short_link(
    client: &Client,
    short_url: &Url,
    timeout: Duration,
) -> Result<Url, FetchError> {
    let response = client
        .head(short_url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            error!(%short_url, "error resolving short link: {e}");
            FetchError::Network(e)
        })?;

    let resolved = response.url().clone();
    if is_short_link(&resolved) {
        error!(%short_url, "short link did not redirect anywhere");
        return Err(FetchError::ShortLink(short_url.to_string()));
    }

    info!(%short_url, %resolved, "resolved short link");
    Ok(resolved)
}
