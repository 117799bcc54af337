//! Checkout conversation and the payment-status watch.
//!
//! Delivery info arrives as free text; the order is then created in one
//! repository transaction (snapshot cart lines at current prices, clear
//! the cart), a payment intent is requested and a background task polls
//! the provider until the payment reaches a terminal state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use crate::errors::ShopError;
use crate::fulfillment::FulfillmentLedger;
use crate::messenger::Messenger;
use crate::models::{format_cents, Order, PaymentStatus};
use crate::payment::PaymentGateway;
use crate::repository::Repository;

use super::ui_builder;
use super::AppContext;

/// Longest delay between polls once backoff has kicked in.
const BACKOFF_CAP: Duration = Duration::from_secs(300);

/// Ask for delivery details and mark the checkout as pending.
pub async fn begin_checkout(ctx: &AppContext, user_id: i64) -> Result<()> {
    info!(user_id = %user_id, "Checkout started");
    ctx.sessions.begin_checkout(user_id);

    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
    let message_id = ctx
        .messenger
        .send_text(
            user_id,
            "Send your delivery details (address, phone, etc.) 👇",
            None,
        )
        .await?;
    ctx.screens.record(user_id, message_id);
    Ok(())
}

/// Free text while a checkout is pending: create the order, request the
/// payment and start watching it.
pub async fn submit_delivery_info(ctx: &AppContext, user_id: i64, text: &str) -> Result<()> {
    if !ctx.sessions.has_checkout(user_id) {
        let signal = ShopError::NoPendingCheckout;
        warn!(user_id = %user_id, error = %signal, "Delivery info arrived without a checkout");
        let message_id = ctx
            .messenger
            .send_text(
                user_id,
                "❌ No checkout is in progress. Please start over.",
                Some(ui_builder::main_menu_button()),
            )
            .await?;
        ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
        return Ok(());
    }

    let order = match ctx.repo.create_order(user_id, text.trim(), Utc::now()).await {
        Ok(order) => order,
        Err(ShopError::NotFound(_)) => {
            ctx.sessions.take_checkout(user_id);
            let message_id = ctx
                .messenger
                .send_text(
                    user_id,
                    "❌ Your profile was not found. Press /start first.",
                    None,
                )
                .await?;
            ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
            return Ok(());
        }
        // Pending state is kept so the user can resend the details.
        Err(e) => return Err(e.into()),
    };
    ctx.sessions.take_checkout(user_id);

    let total = order.total_cents();
    info!(user_id = %user_id, order_id = %order.id, total_cents = %total, "Order created");

    let intent = match ctx
        .payments
        .create_payment(
            total,
            &ctx.config.currency,
            &format!("Order #{}", order.id),
            &format!("order-{}", order.id),
        )
        .await
    {
        Ok(intent) => intent,
        Err(e) => {
            error!(user_id = %user_id, order_id = %order.id, error = %e,
                "Failed to create payment");
            let message_id = ctx
                .messenger
                .send_text(
                    user_id,
                    "⚠️ The payment service is unavailable right now. \
                     Your order is saved, we will contact you.",
                    Some(ui_builder::main_menu_button()),
                )
                .await?;
            ctx.screens.replace(ctx.messenger.as_ref(), user_id, message_id).await;
            return Ok(());
        }
    };

    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;
    let confirmation = format!(
        "✅ Order #{} accepted!\n\nTotal: {} {}\nPay here: {}\n\nYou will get a message once the payment clears.",
        order.id,
        format_cents(total),
        ctx.config.currency_symbol,
        intent.redirect_url
    );
    let message_id = ctx
        .messenger
        .send_text(user_id, &confirmation, Some(ui_builder::main_menu_button()))
        .await?;
    ctx.screens.record(user_id, message_id);

    PaymentWatch {
        messenger: Arc::clone(&ctx.messenger),
        repo: Arc::clone(&ctx.repo),
        payments: Arc::clone(&ctx.payments),
        ledger: Arc::clone(&ctx.ledger),
        order,
        payment_id: intent.payment_id,
        poll_interval: ctx.config.payment_poll_interval,
        abandon_after: ctx.config.payment_abandon_after,
    }
    .spawn();

    Ok(())
}

/// Background poller for one payment.
pub struct PaymentWatch {
    pub messenger: Arc<dyn Messenger>,
    pub repo: Arc<dyn Repository>,
    pub payments: Arc<dyn PaymentGateway>,
    pub ledger: Arc<FulfillmentLedger>,
    pub order: Order,
    pub payment_id: String,
    pub poll_interval: Duration,
    pub abandon_after: Duration,
}

impl PaymentWatch {
    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    /// Poll until the payment is terminal. Transient failures back off
    /// exponentially with jitter; the failure counter resets on any
    /// successful poll. The watch gives up after `abandon_after`.
    pub async fn run(self) {
        let deadline = tokio::time::Instant::now() + self.abandon_after;
        let mut failures: u32 = 0;

        loop {
            let delay = if failures == 0 {
                self.poll_interval
            } else {
                backoff_delay(self.poll_interval, failures)
            };
            tokio::time::sleep(delay).await;

            if tokio::time::Instant::now() >= deadline {
                warn!(order_id = %self.order.id, payment_id = %self.payment_id,
                    "Payment watch abandoned, order left pending");
                return;
            }

            match self.payments.get_status(&self.payment_id).await {
                Ok(PaymentStatus::Pending) => {
                    failures = 0;
                }
                Ok(status) => {
                    self.finish(status).await;
                    return;
                }
                Err(e) => {
                    failures += 1;
                    warn!(order_id = %self.order.id, payment_id = %self.payment_id,
                        failures = %failures, error = %e, "Payment status poll failed");
                }
            }
        }
    }

    async fn finish(&self, status: PaymentStatus) {
        info!(order_id = %self.order.id, status = %status.as_str(), "Payment reached terminal state");

        if let Err(e) = self.repo.update_payment_status(self.order.id, status).await {
            error!(order_id = %self.order.id, error = %e, "Failed to persist payment status");
        }

        let text = match status {
            PaymentStatus::Succeeded => {
                if let Err(e) = self.ledger.append(&self.order).await {
                    error!(order_id = %self.order.id, error = %e,
                        "Failed to append fulfillment record");
                }
                format!(
                    "✅ Payment received for order #{}! We are preparing it for delivery.",
                    self.order.id
                )
            }
            PaymentStatus::Canceled => {
                format!("❌ The payment for order #{} was canceled.", self.order.id)
            }
            _ => format!("❌ The payment for order #{} failed.", self.order.id),
        };

        if let Err(e) = self
            .messenger
            .send_text(self.order.user_id, &text, None)
            .await
        {
            error!(order_id = %self.order.id, error = %e, "Failed to notify user about payment");
        }
    }
}

fn backoff_delay(base: Duration, failures: u32) -> Duration {
    let exp = base.saturating_mul(2u32.saturating_pow(failures.min(16)));
    let capped = exp.min(BACKOFF_CAP);
    let jitter_ms: u64 = rand::thread_rng().gen_range(0..=999);
    capped + Duration::from_millis(jitter_ms)
}
