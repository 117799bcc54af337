//! Cart conversation state machine.
//!
//! Add flow: product card button → quantity prompt → confirmation →
//! additive merge into the cart. Update flow: cart card button →
//! quantity prompt → immediate overwrite. One pending entry per user;
//! starting a new flow silently replaces the previous one.

use anyhow::Result;
use tracing::{info, warn};

use crate::errors::ShopError;
use crate::messenger::Messenger;
use crate::repository::Repository;
use crate::session::{CartSession, ProductSnapshot};

use super::ui_builder;
use super::AppContext;

/// Largest quantity accepted from free text.
pub const MAX_QUANTITY: i32 = 10_000;

/// Parse a typed quantity. Positive integers only, bounded above.
pub fn parse_quantity(text: &str) -> Result<i32, ShopError> {
    let trimmed = text.trim();
    match trimmed.parse::<i32>() {
        Ok(q) if q >= 1 && q <= MAX_QUANTITY => Ok(q),
        _ => Err(ShopError::InvalidQuantity(trimmed.to_string())),
    }
}

/// Start the add flow for a product: snapshot it, ask for a quantity.
pub async fn begin_add(ctx: &AppContext, user_id: i64, product_id: i64) -> Result<()> {
    let Some(product) = ctx.repo.get_product(product_id).await? else {
        warn!(user_id = %user_id, product_id = %product_id, "Add requested for unknown product");
        ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
        let message_id = ctx
            .messenger
            .send_text(
                user_id,
                "❌ Sorry, this product is no longer available.",
                Some(ui_builder::main_menu_button()),
            )
            .await?;
        ctx.screens.record(user_id, message_id);
        return Ok(());
    };

    info!(user_id = %user_id, product_id = %product_id, "Asking quantity for cart add");
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
    let message_id = ctx
        .messenger
        .send_text(user_id, "Send the quantity as a number:", None)
        .await?;
    ctx.screens.record(user_id, message_id);

    ctx.sessions.set_cart(
        user_id,
        CartSession::AwaitingQuantity {
            product: ProductSnapshot {
                id: product.id,
                name: product.name,
                price_cents: product.price_cents,
            },
        },
    );
    Ok(())
}

/// Start the update flow for an existing cart line.
pub async fn begin_update(ctx: &AppContext, user_id: i64, product_id: i64) -> Result<()> {
    info!(user_id = %user_id, product_id = %product_id, "Asking quantity for cart update");
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
    let message_id = ctx
        .messenger
        .send_text(user_id, "Send the new quantity as a number:", None)
        .await?;
    ctx.screens.record(user_id, message_id);

    ctx.sessions
        .set_cart(user_id, CartSession::AwaitingUpdateQuantity { product_id });
    Ok(())
}

async fn reprompt(ctx: &AppContext, user_id: i64) -> Result<()> {
    let message_id = ctx
        .messenger
        .send_text(
            user_id,
            "❌ The quantity must be a whole number greater than 0. Try again:",
            None,
        )
        .await?;
    ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
    Ok(())
}

/// Handle free text while a cart flow is pending. Invalid input
/// re-prompts and leaves the pending state untouched.
pub async fn submit_quantity(ctx: &AppContext, user_id: i64, text: &str) -> Result<()> {
    let Some(session) = ctx.sessions.cart(user_id) else {
        let message_id = ctx
            .messenger
            .send_text(
                user_id,
                "❌ Nothing is waiting for a quantity. Please start over.",
                Some(ui_builder::main_menu_button()),
            )
            .await?;
        ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
        return Ok(());
    };

    let quantity = match parse_quantity(text) {
        Ok(q) => q,
        Err(e) => {
            info!(user_id = %user_id, error = %e, "Rejected quantity input");
            return reprompt(ctx, user_id).await;
        }
    };

    match session {
        // A second number while the confirmation is shown simply revises
        // the pending quantity.
        CartSession::AwaitingQuantity { product }
        | CartSession::AwaitingConfirmation { product, .. } => {
            ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
            let question = format!(
                "Add {} × {} to your cart?",
                quantity, product.name
            );
            let message_id = ctx
                .messenger
                .send_text(user_id, &question, Some(ui_builder::confirm_add_keyboard()))
                .await?;
            ctx.screens.record(user_id, message_id);
            ctx.sessions.set_cart(
                user_id,
                CartSession::AwaitingConfirmation { product, quantity },
            );
        }
        // Updates apply immediately, no confirmation step.
        CartSession::AwaitingUpdateQuantity { product_id } => {
            match ctx.repo.set_cart_quantity(user_id, product_id, quantity).await {
                Ok(()) => {
                    info!(user_id = %user_id, product_id = %product_id, quantity = %quantity,
                        "Cart line updated");
                    ctx.sessions.take_cart(user_id);
                    render_cart(ctx, user_id).await?;
                }
                Err(ShopError::NotFound(_)) => {
                    ctx.sessions.take_cart(user_id);
                    let message_id = ctx
                        .messenger
                        .send_text(
                            user_id,
                            "❌ Your profile was not found. Press /start first.",
                            None,
                        )
                        .await?;
                    ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

/// Confirmation button: merge the pending quantity into the cart.
/// A stale press (no pending entry, or no quantity yet) gets a
/// start-over message instead of a crash.
pub async fn confirm_add(ctx: &AppContext, user_id: i64) -> Result<()> {
    let (product, quantity) = match ctx.sessions.cart(user_id) {
        Some(CartSession::AwaitingConfirmation { product, quantity }) => (product, quantity),
        _ => {
            let signal = ShopError::NoPendingCartEntry;
            warn!(user_id = %user_id, error = %signal, "Confirm pressed without a pending entry");
            let message_id = ctx
                .messenger
                .send_text(
                    user_id,
                    "❌ Error! Set the quantity first.",
                    Some(ui_builder::main_menu_button()),
                )
                .await?;
            ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
            return Ok(());
        }
    };

    match ctx.repo.add_to_cart(user_id, product.id, quantity).await {
        Ok(()) => {
            info!(user_id = %user_id, product_id = %product.id, quantity = %quantity,
                "Cart line added");
            ctx.sessions.take_cart(user_id);
            ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
            let text = format!("✅ {} × {} added to your cart!", quantity, product.name);
            let message_id = ctx
                .messenger
                .send_text(user_id, &text, Some(ui_builder::after_add_keyboard()))
                .await?;
            ctx.screens.record(user_id, message_id);
        }
        Err(ShopError::NotFound(_)) => {
            ctx.sessions.take_cart(user_id);
            let message_id = ctx
                .messenger
                .send_text(
                    user_id,
                    "❌ Your profile was not found. Press /start first.",
                    None,
                )
                .await?;
            ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Remove a line and re-render. Removing an absent line is a no-op.
pub async fn remove_line(ctx: &AppContext, user_id: i64, product_id: i64) -> Result<()> {
    match ctx.repo.remove_from_cart(user_id, product_id).await {
        Ok(()) | Err(ShopError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    info!(user_id = %user_id, product_id = %product_id, "Cart line removed");
    render_cart(ctx, user_id).await
}

/// Render the cart: one card per line plus a total footer, or an
/// empty-cart screen.
pub async fn render_cart(ctx: &AppContext, user_id: i64) -> Result<()> {
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;

    let items = match ctx.repo.list_cart(user_id).await {
        Ok(items) => items,
        // A user who never pressed /start has no profile and no cart.
        Err(ShopError::NotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    if items.is_empty() {
        let message_id = ctx
            .messenger
            .send_text(
                user_id,
                "🛒 Your cart is empty.",
                Some(ui_builder::main_menu_button()),
            )
            .await?;
        ctx.screens.record(user_id, message_id);
        return Ok(());
    }

    let symbol = &ctx.config.currency_symbol;
    for item in &items {
        let message_id = ctx
            .messenger
            .send_text(
                user_id,
                &ui_builder::cart_card_text(item, symbol),
                Some(ui_builder::cart_card_keyboard(item.product.id)),
            )
            .await?;
        ctx.screens.record(user_id, message_id);
    }

    let message_id = ctx
        .messenger
        .send_text(
            user_id,
            &ui_builder::cart_summary_text(&items, symbol),
            Some(ui_builder::cart_summary_keyboard()),
        )
        .await?;
    ctx.screens.record(user_id, message_id);
    Ok(())
}
