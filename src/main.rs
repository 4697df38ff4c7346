mod bot;
mod config;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::ChatKind;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use bot::{Engine, Store, TelegramClient};
use config::Config;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet; this must still reach the operator.
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging: stdout plus a rolling file under DATA_DIR/logs
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("atsbot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(config.log_level.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(config.log_level.into()),
                ),
        )
        .init();

    info!("🚀 Starting ATS resume bot...");
    info!("Gateway mode: {:?}, environment: {:?}", config.gateway_mode, config.environment);
    if config.is_production() && config.gateway_mode == config::GatewayMode::Sandbox {
        warn!("Production environment is using the sandbox payment gateway");
    }

    let bot = Bot::new(&config.telegram_bot_token);
    match bot.get_me().await {
        Ok(me) => {
            if me.username() != config.bot_username {
                warn!(
                    "Token belongs to @{}, configured BOT_USERNAME is @{}",
                    me.username(),
                    config.bot_username
                );
            } else {
                info!("Running as @{}", me.username());
            }
        }
        Err(e) => warn!("Failed to get bot info: {e}"),
    }

    std::fs::create_dir_all(&config.data_dir).ok();
    let store = match Store::open(&config.data_dir.join("atsbot.db")) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Database error: {e}");
            std::process::exit(1);
        }
    };

    let telegram = Arc::new(TelegramClient::new(bot.clone()));
    let engine = Arc::new(Engine::new(config, telegram, store));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_message(msg: Message, engine: Arc<Engine>) -> ResponseResult<()> {
    // Resume sessions are private; ignore group traffic entirely.
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        return Ok(());
    }
    let user = match msg.from {
        Some(ref u) => u,
        None => return Ok(()),
    };
    let chat_id = msg.chat.id.0;
    let user_id = user.id.0 as i64;
    let username = user.username.as_deref();
    let first_name = user.first_name.as_str();

    if let Some(document) = msg.document() {
        let filename = document.file_name.as_deref().unwrap_or("resume");
        engine
            .handle_document(
                chat_id,
                user_id,
                username,
                first_name,
                &document.file.id.0,
                document.file.size,
                filename,
            )
            .await;
    } else if let Some(text) = msg.text() {
        engine.handle_text(chat_id, user_id, username, first_name, text).await;
    }

    Ok(())
}

async fn handle_callback(query: CallbackQuery, engine: Arc<Engine>) -> ResponseResult<()> {
    let data = match query.data {
        Some(ref d) => d.as_str(),
        None => return Ok(()),
    };
    let chat_id = match query.message {
        Some(ref msg) => msg.chat().id.0,
        None => return Ok(()),
    };
    let user_id = query.from.id.0 as i64;

    engine.handle_callback(&query.id.0, chat_id, user_id, data).await;
    Ok(())
}
