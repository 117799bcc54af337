//! Checkout: atomic order creation, payment intent, status watch.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use teleshop::bot::checkout_flow::{self, PaymentWatch};
use teleshop::bot::cart_flow;
use teleshop::fulfillment::FulfillmentLedger;
use teleshop::models::{PaymentStatus, ShopUser};
use teleshop::repository::Repository;

const USER: i64 = 300;

struct Shop {
    h: common::TestHarness,
    hammer: i64,
    saw: i64,
}

async fn shop() -> Result<Shop> {
    let h = common::harness();
    let cat = h.repo.seed_category("Tools");
    let sub = h.repo.seed_subcategory(cat, "Hand tools");
    let hammer = h.repo.seed_product(sub, "Hammer", 1500);
    let saw = h.repo.seed_product(sub, "Saw", 2000);
    h.repo
        .upsert_user(&ShopUser {
            telegram_id: USER,
            username: Some("ada".to_string()),
            first_name: "Ada".to_string(),
            last_name: None,
        })
        .await?;
    Ok(Shop { h, hammer, saw })
}

#[tokio::test]
async fn test_checkout_is_atomic() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 2).await?;
    s.h.repo.add_to_cart(USER, s.saw, 1).await?;

    checkout_flow::begin_checkout(&s.h.ctx, USER).await?;
    checkout_flow::submit_delivery_info(&s.h.ctx, USER, "Baker St 221b, +44 20").await?;

    // Exactly one order with exactly the pre-checkout lines, and an
    // empty cart.
    assert_eq!(s.h.repo.order_count(), 1);
    let order = s.h.repo.latest_order(USER).await?.expect("order missing");
    assert_eq!(order.lines.len(), 2);
    let hammer_line = order
        .lines
        .iter()
        .find(|l| l.product_id == s.hammer)
        .expect("hammer line");
    assert_eq!(hammer_line.quantity, 2);
    assert_eq!(order.total_cents(), 5000);
    assert_eq!(order.delivery_info, "Baker St 221b, +44 20");
    assert!(s.h.repo.list_cart(USER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_checkout_requests_payment_with_idempotency_key() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 1).await?;

    checkout_flow::begin_checkout(&s.h.ctx, USER).await?;
    checkout_flow::submit_delivery_info(&s.h.ctx, USER, "somewhere").await?;

    let order = s.h.repo.latest_order(USER).await?.unwrap();
    let created = s.h.payments.created.lock().unwrap().clone();
    assert_eq!(created, vec![(1500, format!("order-{}", order.id))]);

    let last = s.h.messenger.last_message(USER);
    assert!(last.text.contains(&format!("Order #{}", order.id)));
    assert!(last.text.contains("https://pay.example/"));
    Ok(())
}

#[tokio::test]
async fn test_empty_cart_checkout_creates_zero_total_order() -> Result<()> {
    let s = shop().await?;

    checkout_flow::begin_checkout(&s.h.ctx, USER).await?;
    checkout_flow::submit_delivery_info(&s.h.ctx, USER, "somewhere").await?;

    let order = s.h.repo.latest_order(USER).await?.unwrap();
    assert!(order.lines.is_empty());
    assert_eq!(order.total_cents(), 0);

    let created = s.h.payments.created.lock().unwrap().clone();
    assert_eq!(created[0].0, 0);
    Ok(())
}

#[tokio::test]
async fn test_prices_are_looked_up_at_checkout_time() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 1).await?;

    // The price changes between cart-add and checkout.
    s.h.repo.set_product_price(s.hammer, 9900);

    checkout_flow::begin_checkout(&s.h.ctx, USER).await?;
    checkout_flow::submit_delivery_info(&s.h.ctx, USER, "somewhere").await?;

    let order = s.h.repo.latest_order(USER).await?.unwrap();
    assert_eq!(order.lines[0].price_cents, 9900);
    assert_eq!(order.total_cents(), 9900);
    Ok(())
}

#[tokio::test]
async fn test_delivery_info_without_checkout_is_rejected() -> Result<()> {
    let s = shop().await?;

    checkout_flow::submit_delivery_info(&s.h.ctx, USER, "somewhere").await?;

    assert_eq!(s.h.repo.order_count(), 0);
    let last = s.h.messenger.last_message(USER);
    assert!(last.text.contains("No checkout is in progress"));
    Ok(())
}

#[tokio::test]
async fn test_checkout_clears_pending_cart_entry() -> Result<()> {
    let s = shop().await?;
    cart_flow::begin_add(&s.h.ctx, USER, s.hammer).await?;

    checkout_flow::begin_checkout(&s.h.ctx, USER).await?;

    // Free text now goes to the checkout, not the stale cart prompt.
    assert!(!s.h.ctx.sessions.has_cart(USER));
    assert!(s.h.ctx.sessions.has_checkout(USER));
    Ok(())
}

fn watch_for(s: &Shop, order: teleshop::models::Order) -> PaymentWatch {
    PaymentWatch {
        messenger: s.h.messenger.clone(),
        repo: s.h.repo.clone(),
        payments: s.h.payments.clone(),
        ledger: Arc::new(FulfillmentLedger::new(s.h.ledger_path())),
        order,
        payment_id: "pay-test".to_string(),
        poll_interval: Duration::from_millis(5),
        abandon_after: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_watch_success_notifies_and_appends_ledger() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 2).await?;
    let order = s.h.repo.create_order(USER, "Baker St 221b", Utc::now()).await?;
    let order_id = order.id;

    s.h.payments.set_status(PaymentStatus::Succeeded);
    watch_for(&s, order).run().await;

    let stored = s.h.repo.latest_order(USER).await?.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Succeeded);

    let last = s.h.messenger.last_message(USER);
    assert!(last.text.contains("Payment received"));

    let ledger = std::fs::read_to_string(s.h.ledger_path())?;
    let row = ledger.lines().next().expect("ledger row");
    let fields: Vec<&str> = row.split('\t').collect();
    assert_eq!(fields[0], order_id.to_string());
    assert_eq!(fields[1], USER.to_string());
    assert_eq!(fields[2], "30.00");
    assert_eq!(fields[3], "Baker St 221b");
    assert_eq!(fields[4], "2x Hammer");
    Ok(())
}

#[tokio::test]
async fn test_watch_survives_transient_poll_failures() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 1).await?;
    let order = s.h.repo.create_order(USER, "somewhere", Utc::now()).await?;

    *s.h.payments.fail_polls_remaining.lock().unwrap() = 2;
    s.h.payments.set_status(PaymentStatus::Succeeded);
    watch_for(&s, order).run().await;

    let stored = s.h.repo.latest_order(USER).await?.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn test_watch_failed_payment_notifies_without_ledger() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 1).await?;
    let order = s.h.repo.create_order(USER, "somewhere", Utc::now()).await?;

    s.h.payments.set_status(PaymentStatus::Failed);
    watch_for(&s, order).run().await;

    let stored = s.h.repo.latest_order(USER).await?.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Failed);

    let last = s.h.messenger.last_message(USER);
    assert!(last.text.contains("failed"));
    assert!(!s.h.ledger_path().exists());
    Ok(())
}

#[tokio::test]
async fn test_watch_abandons_after_deadline() -> Result<()> {
    let s = shop().await?;
    s.h.repo.add_to_cart(USER, s.hammer, 1).await?;
    let order = s.h.repo.create_order(USER, "somewhere", Utc::now()).await?;

    let mut watch = watch_for(&s, order);
    watch.abandon_after = Duration::from_millis(20);
    // Payment never leaves pending; the watch must return on its own.
    watch.run().await;

    let stored = s.h.repo.latest_order(USER).await?.unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
    Ok(())
}
