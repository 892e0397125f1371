use std::sync::Arc;

use teloxide::prelude::*;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod ai;
mod bot;
mod config;
mod db;
mod engine;
mod error;
#[cfg(test)]
mod testing;

use config::AppConfig;
use db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🔮 Starting astrology bot...");

    // Load config
    let config = AppConfig::from_env()?;
    tracing::info!("Config loaded. Model: {}", config.openai_model);

    // Initialize database
    let db = Database::connect(&config.database_url, config.request_timeout()).await?;
    db.run_migrations().await?;
    tracing::info!("Database connected and migrations applied.");

    let llm_client = ai::llm::LlmClient::new(&config)?;

    // Create the Telegram bot
    let bot = Bot::new(&config.telegram_bot_token);
    if let Some(webhook_url) = &config.webhook_url {
        bot.set_webhook(url::Url::parse(webhook_url)?).await?;
        tracing::info!("Webhook registered at {}", webhook_url);
    } else {
        tracing::warn!("WEBHOOK_URL not set, Telegram updates must be routed here manually");
    }

    // Build shared application state
    let state = Arc::new(bot::AppState {
        extractor: engine::extract::Extractor::new(config.extractor_defaults()),
        store: Arc::new(db),
        llm: Arc::new(llm_client),
        messenger: Arc::new(bot::messenger::TelegramMessenger::new(bot)),
        config: config.clone(),
    });

    let app = bot::build_router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on http://{}", config.bind_addr);
    tracing::info!("  POST /api/chat      - web chat");
    tracing::info!("  POST /api/telegram  - Telegram webhook");
    tracing::info!("  GET  /health        - health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
