//! Bot module: dependency context, dispatch schema and the handler
//! error boundary.
//!
//! Submodules:
//! - `message_handler`: commands and free-text routing
//! - `callback_handler`: typed button-press routing
//! - `catalog_flow`: category/subcategory/product navigation
//! - `cart_flow`: cart conversation state machine
//! - `checkout_flow`: checkout conversation and payment watch
//! - `ui_builder`: keyboards and message formatting

pub mod callback_handler;
pub mod cart_flow;
pub mod catalog_flow;
pub mod checkout_flow;
pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineQuery, Message, Update};
use tracing::{debug, error};

use crate::config::Config;
use crate::fulfillment::FulfillmentLedger;
use crate::messenger::Messenger;
use crate::payment::PaymentGateway;
use crate::repository::Repository;
use crate::screen::ScreenRegistry;
use crate::session::SessionStore;
use crate::subscription::SubscriptionGate;

/// Everything a handler needs, injected once at startup. Tests build
/// this from in-memory pieces.
#[derive(Clone)]
pub struct AppContext {
    pub repo: Arc<dyn Repository>,
    pub messenger: Arc<dyn Messenger>,
    pub payments: Arc<dyn PaymentGateway>,
    pub subscriptions: Arc<dyn SubscriptionGate>,
    pub screens: Arc<ScreenRegistry>,
    pub sessions: Arc<SessionStore>,
    pub ledger: Arc<FulfillmentLedger>,
    pub config: Arc<Config>,
}

/// Run one handler under the user's gate, catching every failure at the
/// boundary: log it, apologize, keep the dispatch loop alive.
async fn run_guarded<F>(ctx: &AppContext, user_id: i64, handler: F)
where
    F: std::future::Future<Output = Result<()>>,
{
    // All handling for one user is serialized; pending-state transitions
    // never interleave for the same user.
    let gate = ctx.sessions.user_gate(user_id);
    let _guard = gate.lock().await;

    if let Err(e) = handler.await {
        error!(user_id = %user_id, error = %e, "Handler failed");
        if let Err(send_err) = ctx
            .messenger
            .send_text(user_id, "⚠️ Something went wrong. Please try again.", None)
            .await
        {
            error!(user_id = %user_id, error = %send_err, "Failed to send error notice");
        }
    }
}

async fn on_message(msg: Message, ctx: Arc<AppContext>) -> Result<()> {
    let Some(from) = msg.from.as_ref() else {
        debug!("Ignoring message without a sender");
        return Ok(());
    };
    let Some(text) = msg.text().map(str::to_owned) else {
        debug!(user_id = %from.id, "Ignoring non-text message");
        return Ok(());
    };

    let user = crate::models::ShopUser {
        telegram_id: from.id.0 as i64,
        username: from.username.clone(),
        first_name: from.first_name.clone(),
        last_name: from.last_name.clone(),
    };

    run_guarded(&ctx, user.telegram_id, async {
        message_handler::handle_text(&ctx, &user, &text).await
    })
    .await;
    Ok(())
}

async fn on_callback(bot: Bot, q: CallbackQuery, ctx: Arc<AppContext>) -> Result<()> {
    let user_id = q.from.id.0 as i64;
    let first_name = q.from.first_name.clone();
    let data = q.data.clone().unwrap_or_default();

    run_guarded(&ctx, user_id, async {
        callback_handler::handle_callback(&ctx, user_id, &first_name, &data).await
    })
    .await;

    // Clear the loading state on the pressed button.
    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn on_inline_query(q: InlineQuery, ctx: Arc<AppContext>) -> Result<()> {
    let user_id = q.from.id.0 as i64;

    run_guarded(&ctx, user_id, async {
        message_handler::handle_inline_query(&ctx, &q.id.0, &q.query).await
    })
    .await;
    Ok(())
}

/// The dptree dispatch schema. The [`AppContext`] is provided through
/// the dispatcher's dependency map.
pub fn schema() -> teloxide::dispatching::UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
        .branch(Update::filter_inline_query().endpoint(on_inline_query))
}
