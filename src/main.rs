mod bot;
mod config;
mod error;
mod fetch;
mod gateway;
mod link;
mod logging;
mod relay;
mod scratch;
mod updater;

use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tracing::{error, info};

use crate::config::Config;
use crate::fetch::{FetchSettings, Fetcher};
use crate::gateway::TelegramGateway;
use crate::relay::Relay;
use crate::scratch::ScratchRoot;

async fn run(config: Config) -> anyhow::Result<()> {
    if config.update_ytdlp {
        updater::keep_extractor_updated(&config.ytdlp_path).await?;
    }

    let scratch = ScratchRoot::create(&config.scratch_dir)
        .await
        .with_context(|| format!("could not create {}", config.scratch_dir.display()))?;
    info!(dir = %scratch.path().display(), "scratch directory ready");

    let client = reqwest::Client::builder().use_rustls_tls().build()?;
    let fetcher = Fetcher::new(client, scratch, FetchSettings::from(&config));

    let bot = Bot::new(&config.bot_token);
    let relay = Arc::new(Relay::new(TelegramGateway::new(bot.clone()), fetcher));

    info!("Bot started");
    bot::run(bot, relay).await
}

#[tokio::main]
async fn main() {
    let config = match Config::get_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading configuration: {e:#}");
            std::process::exit(1);
        }
    };

    let guard = match logging::init_logging(&config.log_file, &config.log_level) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error setting up logging: {e:#}");
            std::process::exit(1);
        }
    };

    let result = run(config).await;
    if let Err(e) = &result {
        error!("Bot stopped: {e:#}");
    }
    drop(guard);

    if result.is_err() {
        std::process::exit(1);
    }
}
