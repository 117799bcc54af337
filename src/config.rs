//! Runtime configuration, loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Everything the bot needs from the outside world.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    /// Chat ids the user must be a member of before the catalog opens.
    pub channel_id: String,
    pub group_id: String,
    /// Public invite links shown on the subscribe screen.
    pub channel_url: String,
    pub group_url: String,
    pub payment_api_url: String,
    pub payment_api_key: String,
    pub currency: String,
    pub currency_symbol: String,
    /// Append-only fulfillment log for the shop staff.
    pub ledger_path: PathBuf,
    /// Base interval between payment status polls.
    pub payment_poll_interval: Duration,
    /// Wall-clock deadline after which an unpaid order stops being watched.
    pub payment_abandon_after: Duration,
}

impl Config {
    /// Read the configuration from environment variables. Optional
    /// settings fall back to the defaults below.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        Ok(Config {
            bot_token: env::var("BOT_TOKEN").context("BOT_TOKEN must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            channel_id: env::var("CHANNEL_ID").context("CHANNEL_ID must be set")?,
            group_id: env::var("GROUP_ID").context("GROUP_ID must be set")?,
            channel_url: env::var("TG_CHANNEL_URL").context("TG_CHANNEL_URL must be set")?,
            group_url: env::var("TG_GROUP_URL").context("TG_GROUP_URL must be set")?,
            payment_api_url: env::var("PAYMENT_API_URL")
                .context("PAYMENT_API_URL must be set")?,
            payment_api_key: env::var("PAYMENT_API_KEY")
                .context("PAYMENT_API_KEY must be set")?,
            currency: env::var("CURRENCY").unwrap_or(defaults.currency),
            currency_symbol: env::var("CURRENCY_SYMBOL").unwrap_or(defaults.currency_symbol),
            ledger_path: env::var("LEDGER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ledger_path),
            payment_poll_interval: env::var("PAYMENT_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.payment_poll_interval),
            payment_abandon_after: env::var("PAYMENT_ABANDON_AFTER_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.payment_abandon_after),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot_token: String::new(),
            database_url: String::new(),
            channel_id: String::new(),
            group_id: String::new(),
            channel_url: "https://t.me/example_channel".to_string(),
            group_url: "https://t.me/example_group".to_string(),
            payment_api_url: String::new(),
            payment_api_key: String::new(),
            currency: "RUB".to_string(),
            currency_symbol: "₽".to_string(),
            ledger_path: PathBuf::from("fulfillment.log"),
            payment_poll_interval: Duration::from_secs(10),
            payment_abandon_after: Duration::from_secs(24 * 60 * 60),
        }
    }
}
