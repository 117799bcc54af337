//! Button-press routing.
//!
//! Callback data strings are parsed into a typed action first; business
//! logic never string-matches on raw data.

use anyhow::Result;
use tracing::{debug, warn};

use super::{cart_flow, catalog_flow, checkout_flow, message_handler, AppContext};

/// Every button the bot can render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Start,
    ViewCart,
    ConfirmCart,
    Checkout,
    CatalogPage(u32),
    Category(i64),
    SubcategoryPage { category_id: i64, page: u32 },
    Subcategory(i64),
    ProductPage { subcategory_id: i64, page: u32 },
    AddToCart(i64),
    Remove(i64),
    Update(i64),
}

impl CallbackAction {
    /// Parse button data. Unknown or malformed data yields `None`.
    pub fn parse(data: &str) -> Option<CallbackAction> {
        match data {
            "start" => return Some(CallbackAction::Start),
            "view_cart" => return Some(CallbackAction::ViewCart),
            "confirm_cart" => return Some(CallbackAction::ConfirmCart),
            "checkout" => return Some(CallbackAction::Checkout),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("catalog_page_") {
            return rest.parse().ok().map(CallbackAction::CatalogPage);
        }
        // Longer prefixes first: "subcategory_page_" also starts with
        // "subcategory_".
        if let Some(rest) = data.strip_prefix("subcategory_page_") {
            let (category_id, page) = rest.split_once('_')?;
            return Some(CallbackAction::SubcategoryPage {
                category_id: category_id.parse().ok()?,
                page: page.parse().ok()?,
            });
        }
        if let Some(rest) = data.strip_prefix("subcategory_") {
            return rest.parse().ok().map(CallbackAction::Subcategory);
        }
        if let Some(rest) = data.strip_prefix("product_page_") {
            let (subcategory_id, page) = rest.split_once('_')?;
            return Some(CallbackAction::ProductPage {
                subcategory_id: subcategory_id.parse().ok()?,
                page: page.parse().ok()?,
            });
        }
        if let Some(rest) = data.strip_prefix("category_") {
            return rest.parse().ok().map(CallbackAction::Category);
        }
        if let Some(rest) = data.strip_prefix("add_to_cart_") {
            return rest.parse().ok().map(CallbackAction::AddToCart);
        }
        if let Some(rest) = data.strip_prefix("remove_") {
            return rest.parse().ok().map(CallbackAction::Remove);
        }
        if let Some(rest) = data.strip_prefix("update_") {
            return rest.parse().ok().map(CallbackAction::Update);
        }

        None
    }
}

/// Dispatch one button press for a user.
pub async fn handle_callback(
    ctx: &AppContext,
    user_id: i64,
    first_name: &str,
    data: &str,
) -> Result<()> {
    let Some(action) = CallbackAction::parse(data) else {
        warn!(user_id = %user_id, data = %data, "Ignoring unknown callback data");
        return Ok(());
    };
    debug!(user_id = %user_id, action = ?action, "Handling callback");

    match action {
        CallbackAction::Start => message_handler::send_main_menu(ctx, user_id, first_name).await,
        CallbackAction::ViewCart => cart_flow::render_cart(ctx, user_id).await,
        CallbackAction::ConfirmCart => cart_flow::confirm_add(ctx, user_id).await,
        CallbackAction::Checkout => checkout_flow::begin_checkout(ctx, user_id).await,
        CallbackAction::CatalogPage(page) => {
            catalog_flow::show_categories(ctx, user_id, page).await
        }
        CallbackAction::Category(category_id) => {
            catalog_flow::show_subcategories(ctx, user_id, category_id, 1).await
        }
        CallbackAction::SubcategoryPage { category_id, page } => {
            catalog_flow::show_subcategories(ctx, user_id, category_id, page).await
        }
        CallbackAction::Subcategory(subcategory_id) => {
            catalog_flow::show_products(ctx, user_id, subcategory_id, 1).await
        }
        CallbackAction::ProductPage {
            subcategory_id,
            page,
        } => catalog_flow::show_products(ctx, user_id, subcategory_id, page).await,
        CallbackAction::AddToCart(product_id) => {
            cart_flow::begin_add(ctx, user_id, product_id).await
        }
        CallbackAction::Remove(product_id) => {
            cart_flow::remove_line(ctx, user_id, product_id).await
        }
        CallbackAction::Update(product_id) => {
            cart_flow::begin_update(ctx, user_id, product_id).await
        }
    }
}
