use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::info;
use tracing_subscriber::EnvFilter;

use teleshop::bot::{self, AppContext};
use teleshop::config::Config;
use teleshop::db::{self, PgRepository};
use teleshop::fulfillment::FulfillmentLedger;
use teleshop::messenger::TelegramMessenger;
use teleshop::payment::HttpPaymentGateway;
use teleshop::screen::ScreenRegistry;
use teleshop::session::SessionStore;
use teleshop::subscription::TelegramSubscriptionGate;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting storefront bot");

    let config = Arc::new(Config::from_env()?);

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    db::init_schema(&pool).await?;

    let bot = Bot::new(config.bot_token.clone());

    bot.set_my_commands(vec![
        BotCommand::new("start", "Main menu"),
        BotCommand::new("cart", "Your cart"),
        BotCommand::new("faq", "Frequently asked questions"),
        BotCommand::new("help", "How the bot works"),
    ])
    .await?;

    let ctx = Arc::new(AppContext {
        repo: Arc::new(PgRepository::new(pool)),
        messenger: Arc::new(TelegramMessenger::new(bot.clone())),
        payments: Arc::new(HttpPaymentGateway::new(
            config.payment_api_url.clone(),
            config.payment_api_key.clone(),
        )),
        subscriptions: Arc::new(TelegramSubscriptionGate::new(
            config.bot_token.clone(),
            config.channel_id.clone(),
            config.group_id.clone(),
        )),
        screens: Arc::new(ScreenRegistry::new()),
        sessions: Arc::new(SessionStore::new()),
        ledger: Arc::new(FulfillmentLedger::new(config.ledger_path.clone())),
        config,
    });

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
