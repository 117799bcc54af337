//! Data model for the storefront: users, the catalog tree, cart lines,
//! orders and FAQ entries.
//!
//! Prices are stored in integer cents to keep cart totals exact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A shop customer, keyed by the external chat identifier.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ShopUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

/// Top level of the catalog tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Second level, attached to a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubCategory {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
}

/// A sellable product with a photo reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub image: String,
    pub subcategory_id: i64,
}

/// A cart line joined with its product. Unique per (user, product).
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product: Product,
    pub quantity: i32,
}

impl CartItem {
    pub fn subtotal_cents(&self) -> i64 {
        self.product.price_cents * self.quantity as i64
    }
}

/// Payment lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "failed" => Some(PaymentStatus::Failed),
            "canceled" => Some(PaymentStatus::Canceled),
            _ => None,
        }
    }

    /// Terminal statuses end the payment watch.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

/// One snapshotted line of an order. Price is the product price at
/// checkout time, not at cart-add time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product_id: i64,
    pub name: String,
    pub quantity: i32,
    pub price_cents: i64,
}

/// An immutable order. Only `payment_status` may change after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub delivery_info: String,
    pub payment_status: PaymentStatus,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn total_cents(&self) -> i64 {
        self.lines
            .iter()
            .map(|l| l.price_cents * l.quantity as i64)
            .sum()
    }

    /// Human-readable line summary for the fulfillment ledger,
    /// e.g. "2x Widget; 1x Gadget".
    pub fn item_summary(&self) -> String {
        self.lines
            .iter()
            .map(|l| format!("{}x {}", l.quantity, l.name))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A frequently-asked question with its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FaqEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

/// Format cents as a decimal amount, e.g. `1250` -> "12.50".
pub fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}
