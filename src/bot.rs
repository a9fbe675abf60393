use std::sync::Arc;

use teloxide::prelude::*;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::fetch::Fetcher;
use crate::gateway::{IncomingMessage, TelegramGateway};
use crate::relay::Relay;

pub type TelegramRelay = Relay<TelegramGateway, Fetcher>;

async fn on_message(
    message: Message,
    relay: Arc<TelegramRelay>,
    requests: TaskTracker,
) -> ResponseResult<()> {
    // Only text messages are considered
    let Some(message) = IncomingMessage::from_telegram(&message) else {
        return Ok(());
    };

    if relay.accept(&message).await {
        // Downloads can take a while, don't hold up the dispatcher
        requests.spawn(async move {
            relay.handle(&message).await;
        });
    }
    Ok(())
}

/// Runs the dispatcher until SIGTERM or SIGINT, then lets in-flight
/// requests finish
pub async fn run(bot: Bot, relay: Arc<TelegramRelay>) -> anyhow::Result<()> {
    let handler = Update::filter_message().endpoint(on_message);
    let requests = TaskTracker::new();

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay, requests.clone()])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .build();

    // Register signal handlers
    for (kind, name) in [
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::interrupt(), "SIGINT"),
    ] {
        let mut stream = signal(kind)?;
        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            stream.recv().await;
            info!("Received {name}, exiting");
            if let Ok(shutdown) = token.shutdown() {
                shutdown.await;
            }
        });
    }

    dispatcher.dispatch().await;

    requests.close();
    if !requests.is_empty() {
        info!(pending = requests.len(), "waiting for in-flight requests");
    }
    requests.wait().await;
    Ok(())
}
