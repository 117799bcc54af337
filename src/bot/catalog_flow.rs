//! Navigation through the catalog tree: categories, subcategories and
//! product pages.
//!
//! Every screen here follows the same lifecycle: retire the previous
//! screen, render the new one, record every sent message id.

use anyhow::Result;
use tracing::{info, warn};

use crate::errors::ShopError;
use crate::messenger::Messenger;
use crate::models::{Category, Product, SubCategory};
use crate::repository::Repository;

use super::ui_builder;
use super::AppContext;

pub const CATEGORIES_PER_PAGE: i64 = 5;
pub const SUBCATEGORIES_PER_PAGE: i64 = 5;
pub const PRODUCTS_PER_PAGE: i64 = 3;

/// One page of catalog items. Pages are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_next: bool,
}

fn offset(page: u32, page_size: i64) -> i64 {
    (page.max(1) as i64 - 1) * page_size
}

/// Category page. `has_next` uses the length heuristic: a full page is
/// assumed to have a successor, so the last page can advertise one page
/// too many. Known limitation; the empty follow-up page renders the
/// "nothing here" fallback.
pub async fn category_page(
    repo: &dyn Repository,
    page: u32,
) -> Result<CatalogPage<Category>, ShopError> {
    let items = repo
        .list_categories(CATEGORIES_PER_PAGE, offset(page, CATEGORIES_PER_PAGE))
        .await?;
    let has_next = items.len() as i64 == CATEGORIES_PER_PAGE;
    Ok(CatalogPage {
        items,
        page,
        has_next,
    })
}

/// Subcategory page, same length heuristic as categories.
pub async fn subcategory_page(
    repo: &dyn Repository,
    category_id: i64,
    page: u32,
) -> Result<CatalogPage<SubCategory>, ShopError> {
    let items = repo
        .list_subcategories(
            category_id,
            SUBCATEGORIES_PER_PAGE,
            offset(page, SUBCATEGORIES_PER_PAGE),
        )
        .await?;
    let has_next = items.len() as i64 == SUBCATEGORIES_PER_PAGE;
    Ok(CatalogPage {
        items,
        page,
        has_next,
    })
}

/// Product page plus the subcategory's total product count. Unlike the
/// upper levels, `has_next` comes from the count query and is exact.
pub async fn product_page(
    repo: &dyn Repository,
    subcategory_id: i64,
    page: u32,
) -> Result<(CatalogPage<Product>, i64), ShopError> {
    let total = repo.count_products(subcategory_id).await?;
    let start = offset(page, PRODUCTS_PER_PAGE);
    let items = repo
        .list_products(subcategory_id, PRODUCTS_PER_PAGE, start)
        .await?;
    let has_next = start + PRODUCTS_PER_PAGE < total;
    Ok((
        CatalogPage {
            items,
            page,
            has_next,
        },
        total,
    ))
}

async fn render_empty_level(ctx: &AppContext, user_id: i64, what: &str) -> Result<()> {
    warn!(user_id = %user_id, "No {} to show, falling back to main menu button", what);
    let text = format!("❌ No {} here yet.", what);
    let message_id = ctx
        .messenger
        .send_text(user_id, &text, Some(ui_builder::main_menu_button()))
        .await?;
    ctx.screens.record(user_id, message_id);
    Ok(())
}

/// Render one page of categories.
pub async fn show_categories(ctx: &AppContext, user_id: i64, page: u32) -> Result<()> {
    info!(user_id = %user_id, page = %page, "Showing category page");
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;

    let listing = category_page(ctx.repo.as_ref(), page).await?;
    if listing.items.is_empty() {
        return render_empty_level(ctx, user_id, "categories").await;
    }

    let keyboard = ui_builder::category_list_keyboard(&listing.items, page, listing.has_next);
    let message_id = ctx
        .messenger
        .send_text(user_id, "Pick a category 👇", Some(keyboard))
        .await?;
    ctx.screens.record(user_id, message_id);
    Ok(())
}

/// Render one page of subcategories for a category.
pub async fn show_subcategories(
    ctx: &AppContext,
    user_id: i64,
    category_id: i64,
    page: u32,
) -> Result<()> {
    info!(user_id = %user_id, category_id = %category_id, page = %page, "Showing subcategory page");
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;

    let listing = subcategory_page(ctx.repo.as_ref(), category_id, page).await?;
    if listing.items.is_empty() {
        return render_empty_level(ctx, user_id, "subcategories").await;
    }

    let keyboard = ui_builder::subcategory_list_keyboard(
        &listing.items,
        category_id,
        page,
        listing.has_next,
    );
    let message_id = ctx
        .messenger
        .send_text(user_id, "Pick a subcategory 👇", Some(keyboard))
        .await?;
    ctx.screens.record(user_id, message_id);
    Ok(())
}

/// Render one page of product cards plus a navigation footer.
pub async fn show_products(
    ctx: &AppContext,
    user_id: i64,
    subcategory_id: i64,
    page: u32,
) -> Result<()> {
    info!(user_id = %user_id, subcategory_id = %subcategory_id, page = %page, "Showing product page");
    ctx.screens.clear(ctx.messenger.as_ref(), user_id).await;

    let (listing, total) = product_page(ctx.repo.as_ref(), subcategory_id, page).await?;
    if listing.items.is_empty() {
        return render_empty_level(ctx, user_id, "products").await;
    }

    let symbol = &ctx.config.currency_symbol;
    for product in &listing.items {
        let message_id = ctx
            .messenger
            .send_photo(
                user_id,
                &product.image,
                &ui_builder::product_caption(product, symbol),
                Some(ui_builder::product_card_keyboard(product, symbol)),
            )
            .await?;
        ctx.screens.record(user_id, message_id);
    }

    let total_pages = (total + PRODUCTS_PER_PAGE - 1) / PRODUCTS_PER_PAGE;
    let footer = format!("{} products in total\nPage {} of {}", total, page, total_pages);
    let message_id = ctx
        .messenger
        .send_text(
            user_id,
            &footer,
            Some(ui_builder::product_nav_keyboard(
                subcategory_id,
                page,
                listing.has_next,
            )),
        )
        .await?;
    ctx.screens.record(user_id, message_id);
    Ok(())
}
