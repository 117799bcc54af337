//! UI builder: inline keyboards and message formatting.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;

use crate::models::{format_cents, CartItem, Category, Product, SubCategory};

/// Main menu: catalog, cart and the FAQ inline search.
pub fn main_menu_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "📦 Catalog",
            "catalog_page_1",
        )],
        vec![InlineKeyboardButton::callback("🛒 Cart", "view_cart")],
        vec![InlineKeyboardButton::switch_inline_query_current_chat(
            "❓ FAQ", "",
        )],
    ])
}

/// Two external links shown to users who have not joined yet.
pub fn subscribe_keyboard(channel_url: &str, group_url: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    for (label, url) in [
        ("🔗 Join our channel", channel_url),
        ("🔗 Join our group", group_url),
    ] {
        match url.parse() {
            Ok(parsed) => rows.push(vec![InlineKeyboardButton::url(label, parsed)]),
            Err(e) => warn!(url = %url, error = %e, "Invalid subscribe link in config"),
        }
    }
    InlineKeyboardMarkup::new(rows)
}

/// A single "back to the main menu" button.
pub fn main_menu_button() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🏠 Main menu",
        "start",
    )]])
}

fn nav_row(back: Option<String>, forward: Option<String>) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if let Some(data) = back {
        row.push(InlineKeyboardButton::callback("⬅️ Back", data));
    }
    if let Some(data) = forward {
        row.push(InlineKeyboardButton::callback("➡️ Forward", data));
    }
    row
}

/// One button per category plus a navigation row.
pub fn category_list_keyboard(
    categories: &[Category],
    page: u32,
    has_next: bool,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| {
            vec![InlineKeyboardButton::callback(
                c.name.clone(),
                format!("category_{}", c.id),
            )]
        })
        .collect();

    let nav = nav_row(
        (page > 1).then(|| format!("catalog_page_{}", page - 1)),
        has_next.then(|| format!("catalog_page_{}", page + 1)),
    );
    if !nav.is_empty() {
        rows.push(nav);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn subcategory_list_keyboard(
    subcategories: &[SubCategory],
    category_id: i64,
    page: u32,
    has_next: bool,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = subcategories
        .iter()
        .map(|s| {
            vec![InlineKeyboardButton::callback(
                s.name.clone(),
                format!("subcategory_{}", s.id),
            )]
        })
        .collect();

    let nav = nav_row(
        (page > 1).then(|| format!("subcategory_page_{}_{}", category_id, page - 1)),
        has_next.then(|| format!("subcategory_page_{}_{}", category_id, page + 1)),
    );
    if !nav.is_empty() {
        rows.push(nav);
    }
    InlineKeyboardMarkup::new(rows)
}

/// Keyboard under a product photo card.
pub fn product_card_keyboard(product: &Product, currency_symbol: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        format!(
            "🛒 Add to cart ({} {})",
            format_cents(product.price_cents),
            currency_symbol
        ),
        format!("add_to_cart_{}", product.id),
    )]])
}

/// Navigation row for product pages. A single-page listing gets an
/// empty keyboard rather than an empty button row.
pub fn product_nav_keyboard(
    subcategory_id: i64,
    page: u32,
    has_next: bool,
) -> InlineKeyboardMarkup {
    let nav = nav_row(
        (page > 1).then(|| format!("product_page_{}_{}", subcategory_id, page - 1)),
        has_next.then(|| format!("product_page_{}_{}", subcategory_id, page + 1)),
    );
    let rows = if nav.is_empty() { Vec::new() } else { vec![nav] };
    InlineKeyboardMarkup::new(rows)
}

pub fn confirm_add_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✅ Confirm", "confirm_cart")],
        vec![InlineKeyboardButton::callback("🏠 Main menu", "start")],
    ])
}

pub fn after_add_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🛒 Go to cart", "view_cart")],
        vec![InlineKeyboardButton::callback("🏠 Main menu", "start")],
    ])
}

/// Per-line controls on a cart card.
pub fn cart_card_keyboard(product_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("🗑 Remove", format!("remove_{}", product_id)),
        InlineKeyboardButton::callback("✏️ Change quantity", format!("update_{}", product_id)),
    ]])
}

pub fn cart_summary_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✅ Checkout", "checkout")],
        vec![InlineKeyboardButton::callback("🏠 Main menu", "start")],
    ])
}

pub fn faq_prompt_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::switch_inline_query_current_chat("🔍 Open FAQ", ""),
    ]])
}

pub fn faq_result_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::switch_inline_query_current_chat(
            "🔍 Another question",
            "",
        )],
        vec![InlineKeyboardButton::callback("🏠 Main menu", "start")],
    ])
}

/// Caption for a product photo card.
pub fn product_caption(product: &Product, currency_symbol: &str) -> String {
    format!(
        "{}\n\n{}\n\nPrice: {} {}",
        product.name,
        product.description,
        format_cents(product.price_cents),
        currency_symbol
    )
}

/// One cart card: name, quantity, subtotal.
pub fn cart_card_text(item: &CartItem, currency_symbol: &str) -> String {
    format!(
        "{}\n{} × {} {} = {} {}",
        item.product.name,
        item.quantity,
        format_cents(item.product.price_cents),
        currency_symbol,
        format_cents(item.subtotal_cents()),
        currency_symbol
    )
}

/// Cart footer with the grand total.
pub fn cart_summary_text(items: &[CartItem], currency_symbol: &str) -> String {
    let total: i64 = items.iter().map(|i| i.subtotal_cents()).sum();
    format!("Total: {} {}", format_cents(total), currency_symbol)
}
