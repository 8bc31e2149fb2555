mod balance;
mod config;
mod conversation;
mod server;
mod telegram_log;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use balance::BalanceClient;
use config::{Config, Mode};
use conversation::{Controller, InMemorySessions, IncomingMessage, TelegramClient};

struct BotState {
    controller: Controller,
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "bot.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);
    let _log_guard = init_logging(&config, &bot);

    info!("🚀 Starting transit balance bot...");
    info!("Loaded config from {config_path}");
    info!("Balance API: {} (timeout {:?})", config.balance_api_url, config.balance_timeout);

    let lookup = match BalanceClient::new(config.balance_api_url.clone(), config.balance_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build balance client: {e}");
            std::process::exit(1);
        }
    };

    let controller = Controller::new(
        Arc::new(lookup),
        Arc::new(InMemorySessions::new()),
        Arc::new(TelegramClient::new(bot.clone())),
    );
    let state = Arc::new(BotState { controller });

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {e}", config.listen_addr);
            std::process::exit(1);
        }
    };

    let handler = Update::filter_message().endpoint(handle_message);
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match (config.mode, config.webhook_url.clone()) {
        (Mode::Webhook, Some(url)) => {
            info!("🤖 Webhook mode: {url}");
            let options = webhooks::Options::new(config.listen_addr, url);
            let (update_listener, stop_flag, webhook_router) =
                match webhooks::axum_to_router(bot.clone(), options).await {
                    Ok(parts) => parts,
                    Err(e) => {
                        error!("Failed to set webhook: {e}");
                        std::process::exit(1);
                    }
                };

            let app = webhook_router.merge(server::health_router());
            let http = tokio::spawn(server::serve(listener, app, stop_flag));

            dispatcher
                .dispatch_with_listener(
                    update_listener,
                    LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
                )
                .await;
            http.await.ok();
        }
        _ => {
            info!("🤖 Long polling mode");
            if let Err(e) = bot.delete_webhook().await {
                warn!("Failed to delete webhook: {e}");
            }

            let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
            let http = tokio::spawn(server::serve(listener, server::health_router(), async move {
                stop_rx.await.ok();
            }));

            dispatcher.dispatch().await;
            stop_tx.send(()).ok();
            http.await.ok();
        }
    }

    info!("🛑 Shut down");
}

fn init_logging(config: &Config, bot: &Bot) -> Option<WorkerGuard> {
    let log_dir = config.data_dir.join("logs");
    let file_writer = std::fs::create_dir_all(&log_dir)
        .and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join("bot.log"))
        })
        .map_err(|e| eprintln!("File logging disabled: {e}"))
        .ok()
        .map(tracing_appender::non_blocking);
    let (file_layer, guard) = match file_writer {
        Some((non_blocking, guard)) => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_filter(
                        tracing_subscriber::EnvFilter::from_default_env()
                            .add_directive(tracing::Level::INFO.into()),
                    ),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    let tg_layer = config
        .log_chat_id
        .map(|chat_id| telegram_log::TelegramLogLayer::new(bot.clone(), chat_id));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(file_layer)
        .with(tg_layer)
        .init();

    guard
}

async fn handle_message(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        debug!("Ignoring non-text message in chat {}", msg.chat.id);
        return Ok(());
    };

    let user_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0 as i64)
        .unwrap_or(msg.chat.id.0);

    state
        .controller
        .handle(IncomingMessage {
            user_id,
            chat_id: msg.chat.id.0,
            text: text.to_string(),
        })
        .await;

    Ok(())
}
