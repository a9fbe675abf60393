use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use itertools::Itertools;
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, MessageId, ReplyParameters};

/// Telegram only accepts albums of up to this many items
pub const MAX_ALBUM_SIZE: usize = 10;

/// The parts of an inbound text message the relay cares about
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
}

impl IncomingMessage {
    pub fn from_telegram(message: &Message) -> Option<Self> {
        Some(Self {
            chat_id: message.chat.id.0,
            message_id: message.id.0,
            text: message.text()?.to_owned(),
        })
    }
}

/// Outbound operations used to answer a chat
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<()>;

    async fn send_video(&self, chat_id: i64, path: &Path, supports_streaming: bool) -> Result<()>;

    /// Send photos as one grouped message, in order
    async fn send_media_group(&self, chat_id: i64, photos: Vec<Vec<u8>>) -> Result<()>;
}

pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(message.chat_id), text)
            .reply_parameters(ReplyParameters::new(MessageId(message.message_id)))
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, path: &Path, supports_streaming: bool) -> Result<()> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path))
            .supports_streaming(supports_streaming)
            .await?;
        Ok(())
    }

    async fn send_media_group(&self, chat_id: i64, photos: Vec<Vec<u8>>) -> Result<()> {
        let albums: Vec<Vec<InputMedia>> = albums(photos)
            .into_iter()
            .map(|album| {
                album
                    .into_iter()
                    .map(|(idx, bytes)| {
                        let file = InputFile::memory(bytes).file_name(format!("slide_{idx}.png"));
                        InputMedia::Photo(InputMediaPhoto::new(file))
                    })
                    .collect()
            })
            .collect();

        for album in albums {
            self.bot.send_media_group(ChatId(chat_id), album).await?;
        }
        Ok(())
    }
}

/// Splits photos into consecutive albums Telegram will accept, numbering
/// each photo from 1
fn albums(photos: Vec<Vec<u8>>) -> Vec<Vec<(usize, Vec<u8>)>> {
    photos
        .into_iter()
        .enumerate()
        .map(|(idx, bytes)| (idx + 1, bytes))
        .chunks(MAX_ALBUM_SIZE)
        .into_iter()
        .map(|chunk| chunk.collect())
        .collect()
}
