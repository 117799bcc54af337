//! End-to-end conversation scenarios.

mod common;

use anyhow::Result;

use teleshop::bot::message_handler;
use teleshop::models::ShopUser;
use teleshop::repository::Repository;

const USER: i64 = 500;

fn ada() -> ShopUser {
    ShopUser {
        telegram_id: USER,
        username: Some("ada".to_string()),
        first_name: "Ada".to_string(),
        last_name: Some("Lovelace".to_string()),
    }
}

#[tokio::test]
async fn test_start_gates_unsubscribed_users() -> Result<()> {
    let h = common::harness_with_subscription(false);

    message_handler::handle_text(&h.ctx, &ada(), "/start").await?;

    // The user is registered even behind the gate.
    assert_eq!(h.repo.user_count(), 1);

    // The subscribe screen: two external links, zero catalog buttons.
    let prompt = h.messenger.last_message(USER);
    assert!(prompt.text.contains("not subscribed"));
    assert_eq!(prompt.url_button_count(), 2);
    assert_eq!(prompt.callback_button_count(), 0);
    let prompt_id = prompt.id;

    // After joining, /start replaces the gate screen with the main menu.
    let subscribed_ctx = h.with_subscription(true);
    message_handler::handle_text(&subscribed_ctx, &ada(), "/start").await?;

    assert!(h.messenger.deleted_ids(USER).contains(&prompt_id));
    let menu = h.messenger.last_message(USER);
    assert!(menu.text.contains("Ada"));
    assert!(menu.text.contains("welcome"));
    // Catalog + Cart callbacks; FAQ is a switch-inline button.
    assert_eq!(menu.callback_button_count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_help_shows_command_list() -> Result<()> {
    let h = common::harness();

    message_handler::handle_text(&h.ctx, &ada(), "/help").await?;

    let last = h.messenger.last_message(USER);
    assert!(last.text.contains("/cart"));
    assert!(last.text.contains("/faq"));
    Ok(())
}

#[tokio::test]
async fn test_cart_command_renders_cart() -> Result<()> {
    let h = common::harness();

    message_handler::handle_text(&h.ctx, &ada(), "/cart").await?;

    let last = h.messenger.last_message(USER);
    assert!(last.text.contains("cart is empty"));
    Ok(())
}

#[tokio::test]
async fn test_free_text_with_nothing_pending_hints() -> Result<()> {
    let h = common::harness();

    message_handler::handle_text(&h.ctx, &ada(), "hello there").await?;

    let last = h.messenger.last_message(USER);
    assert!(last.text.contains("/start"));
    Ok(())
}

#[tokio::test]
async fn test_command_with_bot_suffix_is_recognized() -> Result<()> {
    let h = common::harness();

    message_handler::handle_text(&h.ctx, &ada(), "/help@teleshop_bot").await?;

    let last = h.messenger.last_message(USER);
    assert!(last.text.contains("/faq"));
    Ok(())
}

#[tokio::test]
async fn test_inline_faq_filters_by_substring() -> Result<()> {
    let h = common::harness();
    h.repo.seed_faq("How do I pay?", "Card or invoice, your choice.");
    h.repo.seed_faq("Where is my order?", "Check the tracking link.");
    h.repo.seed_faq("How do I pick a size?", "See the size chart.");

    message_handler::handle_inline_query(&h.ctx, "query-1", "how do i").await?;

    let answers = h.messenger.inline_answers.lock().unwrap().clone();
    assert_eq!(answers.len(), 1);
    let (query_id, results) = &answers[0];
    assert_eq!(query_id, "query-1");
    assert_eq!(results.len(), 2);
    assert!(results[0].text.contains("Card or invoice"));
    Ok(())
}

#[tokio::test]
async fn test_inline_faq_empty_query_lists_everything() -> Result<()> {
    let h = common::harness();
    h.repo.seed_faq("How do I pay?", "Card or invoice.");
    h.repo.seed_faq("Where is my order?", "Check the tracking link.");

    message_handler::handle_inline_query(&h.ctx, "query-2", "").await?;

    let answers = h.messenger.inline_answers.lock().unwrap().clone();
    assert_eq!(answers[0].1.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_full_purchase_conversation() -> Result<()> {
    use teleshop::bot::callback_handler;

    let h = common::harness();
    let cat = h.repo.seed_category("Tools");
    let sub = h.repo.seed_subcategory(cat, "Hand tools");
    let hammer = h.repo.seed_product(sub, "Hammer", 1500);

    // /start → catalog → category → subcategory → product card.
    message_handler::handle_text(&h.ctx, &ada(), "/start").await?;
    callback_handler::handle_callback(&h.ctx, USER, "Ada", "catalog_page_1").await?;
    callback_handler::handle_callback(&h.ctx, USER, "Ada", &format!("category_{}", cat)).await?;
    callback_handler::handle_callback(&h.ctx, USER, "Ada", &format!("subcategory_{}", sub))
        .await?;

    // Add to cart with confirmation, then check out.
    callback_handler::handle_callback(&h.ctx, USER, "Ada", &format!("add_to_cart_{}", hammer))
        .await?;
    message_handler::handle_text(&h.ctx, &ada(), "2").await?;
    callback_handler::handle_callback(&h.ctx, USER, "Ada", "confirm_cart").await?;
    callback_handler::handle_callback(&h.ctx, USER, "Ada", "view_cart").await?;
    callback_handler::handle_callback(&h.ctx, USER, "Ada", "checkout").await?;
    message_handler::handle_text(&h.ctx, &ada(), "Baker St 221b").await?;

    let order = h.repo.latest_order(USER).await?.expect("order created");
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].quantity, 2);
    assert_eq!(order.total_cents(), 3000);
    assert!(h.repo.list_cart(USER).await?.is_empty());

    let last = h.messenger.last_message(USER);
    assert!(last.text.contains("Order #"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_callback_is_ignored() -> Result<()> {
    use teleshop::bot::callback_handler;

    let h = common::harness();
    callback_handler::handle_callback(&h.ctx, USER, "Ada", "bogus_action").await?;
    assert!(h.messenger.messages_for(USER).is_empty());
    Ok(())
}
