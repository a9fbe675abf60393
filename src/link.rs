use once_cell::sync::Lazy;
use regex::RegexSet;
use url::Url;

static LINK_RE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^https?://(www\.)?tiktok\.com/@[\w.-]+/video/\d+",
        r"^https?://(www\.)?tiktok\.com/@[\w.-]+/photo/\d+",
        r"^https?://vt\.tiktok\.com/[A-Za-z0-9]+/",
    ])
    .unwrap()
});

pub static SHORT_LINK_HOST: &str = "vt.tiktok.com";

/// What a canonical link points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Video,
    PhotoSet,
}

impl ContentKind {
    pub fn of(url: &str) -> Self {
        if url.contains("/photo/") {
            Self::PhotoSet
        } else {
            Self::Video
        }
    }
}

/// Checks whether a message starts with a link the bot knows how to fetch
pub fn is_supported(text: &str) -> bool {
    LINK_RE.is_match(text)
}

pub fn is_short_link(url: &Url) -> bool {
    url.host_str() == Some(SHORT_LINK_HOST)
}

/// Hosts a short link is allowed to expand to
pub fn is_tiktok_host(url: &Url) -> bool {
    matches!(url.host_str(), Some(host) if host == "tiktok.com" || host.ends_with(".tiktok.com"))
}
