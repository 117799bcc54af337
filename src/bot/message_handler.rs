//! Command and free-text routing.

use anyhow::Result;
use tracing::{debug, info};

use crate::messenger::{InlineAnswer, Messenger};
use crate::models::ShopUser;
use crate::repository::Repository;
use crate::subscription::SubscriptionGate;

use super::{cart_flow, checkout_flow, ui_builder, AppContext};

const HELP_TEXT: &str = "I am the shop assistant. Here is what I understand:\n\n\
    /start - main menu\n\
    /cart - your cart\n\
    /faq - frequently asked questions\n\
    /help - this message\n\n\
    Browse the catalog from the main menu, add products to the cart and \
    check out when you are ready.";

/// Render the main menu, or the subscribe screen for users who have not
/// joined the shop's channel and group yet.
pub async fn send_main_menu(ctx: &AppContext, user_id: i64, first_name: &str) -> Result<()> {
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;

    let message_id = if ctx.subscriptions.is_subscribed(user_id).await {
        let text = format!(
            "{}, welcome to the shop 👋\n\nPick a section 👇",
            first_name
        );
        ctx.messenger
            .send_text(user_id, &text, Some(ui_builder::main_menu_keyboard()))
            .await?
    } else {
        info!(user_id = %user_id, "User is not subscribed, showing subscribe screen");
        let text = format!(
            "❗ {}, you are not subscribed to our channel and group yet!\n\n\
             Join both, then press /start again.",
            first_name
        );
        ctx.messenger
            .send_text(
                user_id,
                &text,
                Some(ui_builder::subscribe_keyboard(
                    &ctx.config.channel_url,
                    &ctx.config.group_url,
                )),
            )
            .await?
    };

    ctx.screens.record(user_id, message_id);
    Ok(())
}

/// `/start`: register (or refresh) the user, then show the main menu.
pub async fn handle_start(ctx: &AppContext, user: &ShopUser) -> Result<()> {
    info!(user_id = %user.telegram_id, "Handling /start");
    ctx.repo.upsert_user(user).await?;
    send_main_menu(ctx, user.telegram_id, &user.first_name).await
}

/// `/help`: static help screen.
pub async fn handle_help(ctx: &AppContext, user_id: i64) -> Result<()> {
    let message_id = ctx
        .messenger
        .send_text(user_id, HELP_TEXT, Some(ui_builder::main_menu_button()))
        .await?;
    ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
    Ok(())
}

/// `/faq`: prompt that opens the inline search.
pub async fn handle_faq_prompt(ctx: &AppContext, user_id: i64) -> Result<()> {
    let message_id = ctx
        .messenger
        .send_text(
            user_id,
            "🔍 Type your question after the bot's name to search the FAQ.",
            Some(ui_builder::faq_prompt_keyboard()),
        )
        .await?;
    ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
    Ok(())
}

/// Free text outside a command. Routed to whichever flow is waiting for
/// input; with nothing pending, a short hint.
pub async fn handle_free_text(ctx: &AppContext, user_id: i64, text: &str) -> Result<()> {
    if ctx.sessions.has_cart(user_id) {
        return cart_flow::submit_quantity(ctx, user_id, text).await;
    }
    if ctx.sessions.has_checkout(user_id) {
        return checkout_flow::submit_delivery_info(ctx, user_id, text).await;
    }

    debug!(user_id = %user_id, "Free text with nothing pending");
    ctx.messenger
        .send_text(
            user_id,
            "I did not catch that. Press /start for the main menu.",
            None,
        )
        .await?;
    Ok(())
}

/// One inbound text message: commands first, then pending flows.
pub async fn handle_text(ctx: &AppContext, user: &ShopUser, text: &str) -> Result<()> {
    // "/start@shopbot" in group chats carries the bot name.
    let command = text.trim().split('@').next().unwrap_or("");
    match command {
        "/start" => handle_start(ctx, user).await,
        "/help" => handle_help(ctx, user.telegram_id).await,
        "/faq" => handle_faq_prompt(ctx, user.telegram_id).await,
        "/cart" => cart_flow::render_cart(ctx, user.telegram_id).await,
        _ => handle_free_text(ctx, user.telegram_id, text).await,
    }
}

/// FAQ entries matching an inline query, as ready-to-send articles.
pub async fn faq_inline_results(ctx: &AppContext, query: &str) -> Result<Vec<InlineAnswer>> {
    let needle = query.trim().to_lowercase();
    let entries = ctx.repo.list_faq().await?;

    Ok(entries
        .into_iter()
        .filter(|e| e.question.to_lowercase().contains(&needle))
        .map(|e| InlineAnswer {
            id: e.id.to_string(),
            title: e.question.clone(),
            text: format!("❓ {}\n\n{}", e.question, e.answer),
            description: e.answer.chars().take(50).collect(),
            keyboard: Some(ui_builder::faq_result_keyboard()),
        })
        .collect())
}

/// Answer an inline FAQ search.
pub async fn handle_inline_query(ctx: &AppContext, query_id: &str, query: &str) -> Result<()> {
    debug!(query = %query, "Handling inline FAQ query");
    let results = faq_inline_results(ctx, query).await?;
    ctx.messenger.answer_inline_query(query_id, results).await?;
    Ok(())
}
