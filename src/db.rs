//! Postgres backend for the [`Repository`] trait, on sqlx.
//!
//! Carts and orders reference the internal `shop_users.id`; every public
//! operation takes the external chat identifier and performs the join
//! here, so callers never see internal ids.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::info;

use crate::errors::ShopError;
use crate::models::{
    CartItem, Category, FaqEntry, Order, OrderLine, PaymentStatus, Product, ShopUser, SubCategory,
};
use crate::repository::Repository;

/// Create the schema if it does not exist yet.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_users (
            id BIGSERIAL PRIMARY KEY,
            telegram_id BIGINT NOT NULL UNIQUE,
            username TEXT,
            first_name TEXT NOT NULL,
            last_name TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_users table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_categories (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_subcategories (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            category_id BIGINT NOT NULL REFERENCES shop_categories(id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_subcategories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_products (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price_cents BIGINT NOT NULL,
            image TEXT NOT NULL,
            subcategory_id BIGINT NOT NULL REFERENCES shop_subcategories(id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_products table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_cart (
            user_id BIGINT NOT NULL REFERENCES shop_users(id),
            product_id BIGINT NOT NULL REFERENCES shop_products(id),
            quantity INT NOT NULL,
            PRIMARY KEY (user_id, product_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_cart table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_orders (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES shop_users(id),
            created_at TIMESTAMPTZ NOT NULL,
            delivery_info TEXT NOT NULL,
            payment_status TEXT NOT NULL DEFAULT 'pending'
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_orders table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS shop_order_items (
            order_id BIGINT NOT NULL REFERENCES shop_orders(id),
            product_id BIGINT NOT NULL,
            name TEXT NOT NULL,
            quantity INT NOT NULL,
            price_cents BIGINT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create shop_order_items table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS faq_entries (
            id BIGSERIAL PRIMARY KEY,
            question TEXT NOT NULL,
            answer TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create faq_entries table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// sqlx-backed [`Repository`].
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Internal id for an external chat id.
    async fn internal_user_id(&self, telegram_id: i64) -> Result<i64, ShopError> {
        let row = sqlx::query("SELECT id FROM shop_users WHERE telegram_id = $1")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.get::<i64, _>("id"))
            .ok_or(ShopError::NotFound("user"))
    }

    async fn order_lines(&self, order_id: i64) -> Result<Vec<OrderLine>, ShopError> {
        let rows = sqlx::query(
            "SELECT product_id, name, quantity, price_cents
             FROM shop_order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| OrderLine {
                product_id: r.get("product_id"),
                name: r.get("name"),
                quantity: r.get("quantity"),
                price_cents: r.get("price_cents"),
            })
            .collect())
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn upsert_user(&self, user: &ShopUser) -> Result<(), ShopError> {
        sqlx::query(
            "INSERT INTO shop_users (telegram_id, username, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (telegram_id) DO UPDATE SET
                 username = EXCLUDED.username,
                 first_name = EXCLUDED.first_name,
                 last_name = EXCLUDED.last_name",
        )
        .bind(user.telegram_id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_categories(&self, limit: i64, offset: i64) -> Result<Vec<Category>, ShopError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name FROM shop_categories ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn list_subcategories(
        &self,
        category_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SubCategory>, ShopError> {
        let subcategories = sqlx::query_as::<_, SubCategory>(
            "SELECT id, name, category_id FROM shop_subcategories
             WHERE category_id = $1 ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(subcategories)
    }

    async fn list_products(
        &self,
        subcategory_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, ShopError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price_cents, image, subcategory_id
             FROM shop_products WHERE subcategory_id = $1
             ORDER BY id LIMIT $2 OFFSET $3",
        )
        .bind(subcategory_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn count_products(&self, subcategory_id: i64) -> Result<i64, ShopError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop_products WHERE subcategory_id = $1")
                .bind(subcategory_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn get_product(&self, product_id: i64) -> Result<Option<Product>, ShopError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, description, price_cents, image, subcategory_id
             FROM shop_products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: i64,
        delta: i32,
    ) -> Result<(), ShopError> {
        let internal_id = self.internal_user_id(user_id).await?;
        sqlx::query(
            "INSERT INTO shop_cart (user_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, product_id)
             DO UPDATE SET quantity = shop_cart.quantity + EXCLUDED.quantity",
        )
        .bind(internal_id)
        .bind(product_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<(), ShopError> {
        let internal_id = self.internal_user_id(user_id).await?;
        sqlx::query(
            "INSERT INTO shop_cart (user_id, product_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, product_id)
             DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(internal_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_from_cart(&self, user_id: i64, product_id: i64) -> Result<(), ShopError> {
        let internal_id = self.internal_user_id(user_id).await?;
        sqlx::query("DELETE FROM shop_cart WHERE user_id = $1 AND product_id = $2")
            .bind(internal_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_cart(&self, user_id: i64) -> Result<Vec<CartItem>, ShopError> {
        let internal_id = self.internal_user_id(user_id).await?;
        let rows = sqlx::query(
            "SELECT p.id, p.name, p.description, p.price_cents, p.image, p.subcategory_id,
                    c.quantity
             FROM shop_cart c
             JOIN shop_products p ON p.id = c.product_id
             WHERE c.user_id = $1
             ORDER BY p.id",
        )
        .bind(internal_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| CartItem {
                product: Product {
                    id: r.get("id"),
                    name: r.get("name"),
                    description: r.get("description"),
                    price_cents: r.get("price_cents"),
                    image: r.get("image"),
                    subcategory_id: r.get("subcategory_id"),
                },
                quantity: r.get("quantity"),
            })
            .collect())
    }

    async fn create_order(
        &self,
        user_id: i64,
        delivery_info: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Order, ShopError> {
        let internal_id = self.internal_user_id(user_id).await?;

        // Order insert, line snapshot and cart clear are one transaction:
        // either the whole checkout lands or none of it does.
        let mut tx = self.pool.begin().await?;

        let order_id: i64 = sqlx::query_scalar(
            "INSERT INTO shop_orders (user_id, created_at, delivery_info, payment_status)
             VALUES ($1, $2, $3, 'pending')
             RETURNING id",
        )
        .bind(internal_id)
        .bind(created_at)
        .bind(delivery_info)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO shop_order_items (order_id, product_id, name, quantity, price_cents)
             SELECT $1, p.id, p.name, c.quantity, p.price_cents
             FROM shop_cart c
             JOIN shop_products p ON p.id = c.product_id
             WHERE c.user_id = $2",
        )
        .bind(order_id)
        .bind(internal_id)
        .execute(&mut *tx)
        .await?;

        let line_rows = sqlx::query(
            "SELECT product_id, name, quantity, price_cents
             FROM shop_order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM shop_cart WHERE user_id = $1")
            .bind(internal_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let lines = line_rows
            .into_iter()
            .map(|r| OrderLine {
                product_id: r.get("product_id"),
                name: r.get("name"),
                quantity: r.get("quantity"),
                price_cents: r.get("price_cents"),
            })
            .collect();

        info!(user_id = %user_id, order_id = %order_id, "Order created");

        Ok(Order {
            id: order_id,
            user_id,
            created_at,
            delivery_info: delivery_info.to_string(),
            payment_status: PaymentStatus::Pending,
            lines,
        })
    }

    async fn latest_order(&self, user_id: i64) -> Result<Option<Order>, ShopError> {
        let internal_id = self.internal_user_id(user_id).await?;
        let row = sqlx::query(
            "SELECT id, created_at, delivery_info, payment_status
             FROM shop_orders WHERE user_id = $1
             ORDER BY id DESC LIMIT 1",
        )
        .bind(internal_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let order_id: i64 = row.get("id");
        let status: String = row.get("payment_status");
        let lines = self.order_lines(order_id).await?;

        Ok(Some(Order {
            id: order_id,
            user_id,
            created_at: row.get("created_at"),
            delivery_info: row.get("delivery_info"),
            payment_status: PaymentStatus::parse(&status).unwrap_or(PaymentStatus::Pending),
            lines,
        }))
    }

    async fn update_payment_status(
        &self,
        order_id: i64,
        status: PaymentStatus,
    ) -> Result<(), ShopError> {
        sqlx::query("UPDATE shop_orders SET payment_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_faq(&self) -> Result<Vec<FaqEntry>, ShopError> {
        let entries = sqlx::query_as::<_, FaqEntry>(
            "SELECT id, question, answer FROM faq_entries ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
