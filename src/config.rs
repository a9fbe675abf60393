use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

pub static CONFIG_FILE: &str = "config.toml";
pub static ENV_FILE: &str = "info.env";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    #[serde(default = "default_photo_service_url")]
    pub photo_service_url: String,
    #[serde(default = "default_photo_service_origin")]
    pub photo_service_origin: String,
    #[serde(default)]
    pub update_ytdlp: bool,
}

fn default_scratch_dir() -> PathBuf {
    "tempDownload".into()
}

fn default_log_file() -> PathBuf {
    "bot.log".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_ytdlp_path() -> String {
    "yt-dlp".into()
}

fn default_photo_service_url() -> String {
    "https://ssstik.io/abc?url=dl".into()
}

fn default_photo_service_origin() -> String {
    "https://ssstik.io".into()
}

impl Config {
    pub fn get_config() -> Result<Self> {
        load_env_file(ENV_FILE)?;
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(&["BOT_TOKEN"]))
            .merge(Env::prefixed("TIKTOK_RELAY_"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        if config.bot_token.trim().is_empty() {
            bail!("no bot token, set BOT_TOKEN");
        }
        Ok(config)
    }
}

/// Loads `path` into the process environment. A missing file is fine, the
/// real environment works just as well, but a broken one is reported.
fn load_env_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    match dotenvy::from_filename(path) {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}
