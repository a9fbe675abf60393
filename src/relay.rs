use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{error, info, warn};

use crate::fetch::{DownloadedMedia, MediaSource};
use crate::gateway::{ChatGateway, IncomingMessage};
use crate::link::{is_supported, ContentKind};
use crate::scratch::remove_files;

pub static PROCESSING: &str = "Обрабатываю вашу ссылку...";
pub static NOT_A_LINK: &str = "Пожалуйста, отправьте действительную ссылку на TikTok (например, https://vt.tiktok.com или https://www.tiktok.com/.";
pub static DOWNLOAD_FAILED: &str =
    "Не удалось скачать контент. Проверьте ссылку или попробуйте позже.";

fn empty_file_reply(path: &Path) -> String {
    let name = path.file_name().unwrap_or(path.as_os_str());
    format!(
        "Ошибка: файл {} пустой. Попробуйте другую ссылку.",
        name.to_string_lossy()
    )
}

fn error_reply(error: &anyhow::Error) -> String {
    format!("Произошла ошибка: {error}")
}

/// Fetches the media behind a link and forwards it to the chat it came from
pub struct Relay<G, S> {
    gateway: G,
    source: S,
}

impl<G, S> Relay<G, S>
where
    G: ChatGateway,
    S: MediaSource,
{
    pub fn new(gateway: G, source: S) -> Self {
        Self { gateway, source }
    }

    /// Acknowledges a text message, returning whether it carries a link to process
    pub async fn accept(&self, message: &IncomingMessage) -> bool {
        if is_supported(&message.text) {
            info!(chat_id = message.chat_id, text = %message.text, "received TikTok link");
            self.reply(message, PROCESSING).await;
            true
        } else {
            self.reply(message, NOT_A_LINK).await;
            false
        }
    }

    /// Processes one link end to end. Staged files are always removed.
    pub async fn handle(&self, message: &IncomingMessage) {
        let media = match self.source.fetch(&message.text).await {
            Ok(media) => media,
            Err(e) => {
                warn!(chat_id = message.chat_id, "fetch failed: {e}");
                self.reply(message, DOWNLOAD_FAILED).await;
                return;
            }
        };

        if let Err(e) = self.deliver(message, &media).await {
            error!(text = %message.text, "error processing link: {e:#}");
            self.reply(message, &error_reply(&e)).await;
        }

        remove_files(&media.files).await;
        media.scratch.close().await;
    }

    async fn deliver(&self, message: &IncomingMessage, media: &DownloadedMedia) -> Result<()> {
        let files = self.non_empty_files(message, &media.files).await?;

        match media.kind {
            ContentKind::Video => {
                for path in files {
                    self.gateway
                        .send_video(message.chat_id, path, true)
                        .await?;
                    info!(path = %path.display(), "file sent");
                }
            }
            ContentKind::PhotoSet => {
                let mut photos = Vec::with_capacity(files.len());
                for path in files {
                    photos.push(tokio::fs::read(path).await?);
                    info!(path = %path.display(), "added to media group");
                }
                if !photos.is_empty() {
                    let count = photos.len();
                    self.gateway
                        .send_media_group(message.chat_id, photos)
                        .await?;
                    info!(count, "sent media group");
                }
            }
        }

        Ok(())
    }

    /// Drops zero-size files, telling the user about each one
    async fn non_empty_files<'a>(
        &self,
        message: &IncomingMessage,
        paths: &'a [PathBuf],
    ) -> Result<Vec<&'a Path>> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let size = tokio::fs::metadata(path).await?.len();
            if size == 0 {
                error!(path = %path.display(), "downloaded file is empty");
                self.reply(message, &empty_file_reply(path)).await;
                continue;
            }
            info!(path = %path.display(), size, "file size");
            files.push(path.as_path());
        }
        Ok(files)
    }

    /// Sends a reply, logging instead of failing
    async fn reply(&self, message: &IncomingMessage, text: &str) {
        if let Err(e) = self.gateway.reply(message, text).await {
            error!(chat_id = message.chat_id, "error sending message: {e:#}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::FetchError;
    use crate::scratch::RequestScratch;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Reply(String),
        Video(PathBuf, bool),
        MediaGroup(Vec<Vec<u8>>),
    }

    #[derive(Default)]
    struct RecordingGateway {
        sent: Mutex<Vec<Sent>>,
        fail_sends: bool,
    }

    impl RecordingGateway {
        fn failing() -> Self {
            Self {
                fail_sends: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn media_sends(&self) -> Vec<Sent> {
            self.sent()
                .into_iter()
                .filter(|s| !matches!(s, Sent::Reply(_)))
                .collect()
        }

        fn replies(&self) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Reply(text) => Some(text),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        async fn reply(&self, _message: &IncomingMessage, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Reply(text.to_owned()));
            Ok(())
        }

        async fn send_video(&self, _chat_id: i64, path: &Path, streaming: bool) -> Result<()> {
            if self.fail_sends {
                anyhow::bail!("Bad Request: file is too big");
            }
            assert!(path.exists());
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Video(path.to_owned(), streaming));
            Ok(())
        }

        async fn send_media_group(&self, _chat_id: i64, photos: Vec<Vec<u8>>) -> Result<()> {
            if self.fail_sends {
                anyhow::bail!("Bad Request: file is too big");
            }
            self.sent.lock().unwrap().push(Sent::MediaGroup(photos));
            Ok(())
        }
    }

    /// Stages prepared files in a request directory, or fails
    struct StagedSource {
        dir: PathBuf,
        kind: ContentKind,
        contents: Vec<&'static [u8]>,
    }

    impl StagedSource {
        fn new(dir: &Path, kind: ContentKind, contents: Vec<&'static [u8]>) -> Self {
            Self {
                dir: dir.join("request"),
                kind,
                contents,
            }
        }
    }

    #[async_trait]
    impl MediaSource for StagedSource {
        async fn fetch(&self, _url: &str) -> Result<DownloadedMedia, FetchError> {
            std::fs::create_dir_all(&self.dir)?;
            let scratch = RequestScratch::new(&self.dir);
            let (prefix, extension) = match self.kind {
                ContentKind::Video => ("tempVideo", "mp4"),
                ContentKind::PhotoSet => ("tempPhoto", "png"),
            };
            let mut files = Vec::new();
            for content in &self.contents {
                let path = scratch.next_path(prefix, extension)?;
                std::fs::write(&path, content)?;
                files.push(path);
            }
            Ok(DownloadedMedia {
                kind: self.kind,
                files,
                scratch,
            })
        }
    }

    /// Never finishes sending a video, and panics on albums
    struct StalledGateway;

    #[async_trait]
    impl ChatGateway for StalledGateway {
        async fn reply(&self, _message: &IncomingMessage, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_video(&self, _chat_id: i64, _path: &Path, _streaming: bool) -> Result<()> {
            std::future::pending().await
        }

        async fn send_media_group(&self, _chat_id: i64, _photos: Vec<Vec<u8>>) -> Result<()> {
            panic!("album rejected");
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MediaSource for FailingSource {
        async fn fetch(&self, url: &str) -> Result<DownloadedMedia, FetchError> {
            Err(FetchError::ShortLink(url.to_owned()))
        }
    }

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: 42,
            message_id: 7,
            text: text.to_owned(),
        }
    }

    fn video_link() -> IncomingMessage {
        message("https://www.tiktok.com/@user/video/7301234567890123456")
    }

    fn photo_link() -> IncomingMessage {
        message("https://www.tiktok.com/@user/photo/7301234567890123456")
    }

    #[tokio::test]
    async fn accepts_links_only() {
        let relay = Relay::new(RecordingGateway::default(), FailingSource);
        assert!(relay.accept(&message("https://vt.tiktok.com/ZSabc123/")).await);
        assert!(!relay.accept(&message("hello there")).await);
        assert_eq!(
            vec![PROCESSING.to_string(), NOT_A_LINK.to_string()],
            relay.gateway.replies()
        );
    }

    #[tokio::test]
    async fn fetch_failure_replies_once() {
        let relay = Relay::new(RecordingGateway::default(), FailingSource);
        relay.handle(&message("https://vt.tiktok.com/ZSabc123/")).await;
        assert_eq!(vec![Sent::Reply(DOWNLOAD_FAILED.into())], relay.gateway.sent());
    }

    #[tokio::test]
    async fn sends_single_video_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::Video, vec![b"video"]);
        let relay = Relay::new(RecordingGateway::default(), source);

        relay.handle(&video_link()).await;

        let video = root.path().join("request").join("tempVideo_001.mp4");
        assert_eq!(vec![Sent::Video(video.clone(), true)], relay.gateway.sent());
        assert!(!video.exists());
        assert!(!root.path().join("request").exists());
    }

    #[tokio::test]
    async fn sends_photos_as_one_group() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(
            root.path(),
            ContentKind::PhotoSet,
            vec![b"one", b"two", b"three"],
        );
        let relay = Relay::new(RecordingGateway::default(), source);

        relay.handle(&photo_link()).await;

        assert_eq!(
            vec![Sent::MediaGroup(vec![
                b"one".to_vec(),
                b"two".to_vec(),
                b"three".to_vec()
            ])],
            relay.gateway.sent()
        );
        assert!(!root.path().join("request").exists());
    }

    #[tokio::test]
    async fn skips_empty_photos() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(
            root.path(),
            ContentKind::PhotoSet,
            vec![b"one", b"", b"three", b""],
        );
        let relay = Relay::new(RecordingGateway::default(), source);

        relay.handle(&photo_link()).await;

        assert_eq!(
            vec![Sent::MediaGroup(vec![b"one".to_vec(), b"three".to_vec()])],
            relay.gateway.media_sends()
        );
        assert_eq!(
            vec![
                empty_file_reply(Path::new("tempPhoto_002.png")),
                empty_file_reply(Path::new("tempPhoto_004.png")),
            ],
            relay.gateway.replies()
        );
    }

    #[tokio::test]
    async fn all_empty_photos_send_nothing() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::PhotoSet, vec![b"", b""]);
        let relay = Relay::new(RecordingGateway::default(), source);

        relay.handle(&photo_link()).await;

        assert!(relay.gateway.media_sends().is_empty());
        assert_eq!(2, relay.gateway.replies().len());
        assert!(!root.path().join("request").exists());
    }

    #[tokio::test]
    async fn empty_video_is_not_sent() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::Video, vec![b""]);
        let relay = Relay::new(RecordingGateway::default(), source);

        relay.handle(&video_link()).await;

        assert!(relay.gateway.media_sends().is_empty());
        assert_eq!(
            vec![empty_file_reply(Path::new("tempVideo_001.mp4"))],
            relay.gateway.replies()
        );
    }

    #[tokio::test]
    async fn send_failure_reports_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::PhotoSet, vec![b"one", b"two"]);
        let relay = Relay::new(RecordingGateway::failing(), source);

        relay.handle(&photo_link()).await;

        assert_eq!(
            vec!["Произошла ошибка: Bad Request: file is too big".to_string()],
            relay.gateway.replies()
        );
        assert!(!root.path().join("request").join("tempPhoto_001.png").exists());
        assert!(!root.path().join("request").join("tempPhoto_002.png").exists());
        assert!(!root.path().join("request").exists());
    }

    #[tokio::test]
    async fn video_send_failure_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::Video, vec![b"video"]);
        let relay = Relay::new(RecordingGateway::failing(), source);

        relay.handle(&video_link()).await;

        assert_eq!(1, relay.gateway.replies().len());
        assert!(!root.path().join("request").exists());
    }

    #[tokio::test]
    async fn cancelled_delivery_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::Video, vec![b"video"]);
        let relay = Arc::new(Relay::new(StalledGateway, source));

        let task = tokio::spawn({
            let relay = relay.clone();
            async move { relay.handle(&video_link()).await }
        });

        let video = root.path().join("request").join("tempVideo_001.mp4");
        while !video.exists() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();

        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!video.exists());
        assert!(!root.path().join("request").exists());
    }

    #[tokio::test]
    async fn panicking_delivery_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let source = StagedSource::new(root.path(), ContentKind::PhotoSet, vec![b"one", b"two"]);
        let relay = Arc::new(Relay::new(StalledGateway, source));

        let task = tokio::spawn({
            let relay = relay.clone();
            async move { relay.handle(&photo_link()).await }
        });

        assert!(task.await.unwrap_err().is_panic());
        assert!(!root.path().join("request").exists());
    }
}
