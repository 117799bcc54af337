//! Storage abstraction for the storefront.
//!
//! All operations are keyed by the external chat identifier; any internal
//! id join is a backend detail. The Postgres backend lives in [`crate::db`];
//! [`MemoryRepository`] backs tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::ShopError;
use crate::models::{
    CartItem, Category, FaqEntry, Order, OrderLine, PaymentStatus, Product, ShopUser, SubCategory,
};

/// Persistent storage for users, the catalog, carts and orders.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert the user on first contact, refresh the profile otherwise.
    async fn upsert_user(&self, user: &ShopUser) -> Result<(), ShopError>;

    async fn list_categories(&self, limit: i64, offset: i64) -> Result<Vec<Category>, ShopError>;

    async fn list_subcategories(
        &self,
        category_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SubCategory>, ShopError>;

    async fn list_products(
        &self,
        subcategory_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, ShopError>;

    async fn count_products(&self, subcategory_id: i64) -> Result<i64, ShopError>;

    async fn get_product(&self, product_id: i64) -> Result<Option<Product>, ShopError>;

    /// Additive merge: an existing (user, product) line grows by `delta`,
    /// otherwise a new line is created with `delta`.
    async fn add_to_cart(&self, user_id: i64, product_id: i64, delta: i32)
        -> Result<(), ShopError>;

    /// Overwrite the quantity of an existing line; absent line is created.
    async fn set_cart_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<(), ShopError>;

    /// Delete a line. Absent line is a no-op.
    async fn remove_from_cart(&self, user_id: i64, product_id: i64) -> Result<(), ShopError>;

    /// Cart lines joined with their products, in insertion order.
    async fn list_cart(&self, user_id: i64) -> Result<Vec<CartItem>, ShopError>;

    /// Atomically create an order from the current cart: snapshot every
    /// line with its checkout-time price, then clear the cart. An empty
    /// cart yields a zero-line order.
    async fn create_order(
        &self,
        user_id: i64,
        delivery_info: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Order, ShopError>;

    async fn latest_order(&self, user_id: i64) -> Result<Option<Order>, ShopError>;

    async fn update_payment_status(
        &self,
        order_id: i64,
        status: PaymentStatus,
    ) -> Result<(), ShopError>;

    async fn list_faq(&self) -> Result<Vec<FaqEntry>, ShopError>;
}

#[derive(Default)]
struct MemoryStore {
    users: HashMap<i64, ShopUser>,
    categories: Vec<Category>,
    subcategories: Vec<SubCategory>,
    products: Vec<Product>,
    carts: HashMap<i64, Vec<(i64, i32)>>,
    orders: Vec<Order>,
    faq: Vec<FaqEntry>,
    next_id: i64,
}

impl MemoryStore {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Repository`] backend.
///
/// A single mutex guards the whole store, which makes `create_order`
/// trivially atomic. Used by the test suite and handy for local runs
/// without a database.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_category(&self, name: &str) -> i64 {
        let mut store = self.inner.lock().unwrap();
        let id = store.alloc_id();
        store.categories.push(Category {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn seed_subcategory(&self, category_id: i64, name: &str) -> i64 {
        let mut store = self.inner.lock().unwrap();
        let id = store.alloc_id();
        store.subcategories.push(SubCategory {
            id,
            name: name.to_string(),
            category_id,
        });
        id
    }

    pub fn seed_product(&self, subcategory_id: i64, name: &str, price_cents: i64) -> i64 {
        let mut store = self.inner.lock().unwrap();
        let id = store.alloc_id();
        store.products.push(Product {
            id,
            name: name.to_string(),
            description: format!("{} description", name),
            price_cents,
            image: format!("https://shop.example/media/{}.jpg", id),
            subcategory_id,
        });
        id
    }

    pub fn seed_faq(&self, question: &str, answer: &str) -> i64 {
        let mut store = self.inner.lock().unwrap();
        let id = store.alloc_id();
        store.faq.push(FaqEntry {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
        });
        id
    }

    /// Change a product price in place (checkout-time pricing tests).
    pub fn set_product_price(&self, product_id: i64, price_cents: i64) {
        let mut store = self.inner.lock().unwrap();
        if let Some(p) = store.products.iter_mut().find(|p| p.id == product_id) {
            p.price_cents = price_cents;
        }
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn order_count(&self) -> usize {
        self.inner.lock().unwrap().orders.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn upsert_user(&self, user: &ShopUser) -> Result<(), ShopError> {
        let mut store = self.inner.lock().unwrap();
        store.users.insert(user.telegram_id, user.clone());
        Ok(())
    }

    async fn list_categories(&self, limit: i64, offset: i64) -> Result<Vec<Category>, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .categories
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_subcategories(
        &self,
        category_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SubCategory>, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .subcategories
            .iter()
            .filter(|s| s.category_id == category_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_products(
        &self,
        subcategory_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Product>, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .products
            .iter()
            .filter(|p| p.subcategory_id == subcategory_id)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_products(&self, subcategory_id: i64) -> Result<i64, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .products
            .iter()
            .filter(|p| p.subcategory_id == subcategory_id)
            .count() as i64)
    }

    async fn get_product(&self, product_id: i64) -> Result<Option<Product>, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn add_to_cart(
        &self,
        user_id: i64,
        product_id: i64,
        delta: i32,
    ) -> Result<(), ShopError> {
        let mut store = self.inner.lock().unwrap();
        let cart = store.carts.entry(user_id).or_default();
        if let Some(line) = cart.iter_mut().find(|(pid, _)| *pid == product_id) {
            line.1 += delta;
        } else {
            cart.push((product_id, delta));
        }
        Ok(())
    }

    async fn set_cart_quantity(
        &self,
        user_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> Result<(), ShopError> {
        let mut store = self.inner.lock().unwrap();
        let cart = store.carts.entry(user_id).or_default();
        if let Some(line) = cart.iter_mut().find(|(pid, _)| *pid == product_id) {
            line.1 = quantity;
        } else {
            cart.push((product_id, quantity));
        }
        Ok(())
    }

    async fn remove_from_cart(&self, user_id: i64, product_id: i64) -> Result<(), ShopError> {
        let mut store = self.inner.lock().unwrap();
        if let Some(cart) = store.carts.get_mut(&user_id) {
            cart.retain(|(pid, _)| *pid != product_id);
        }
        Ok(())
    }

    async fn list_cart(&self, user_id: i64) -> Result<Vec<CartItem>, ShopError> {
        let store = self.inner.lock().unwrap();
        let lines = store.carts.get(&user_id).cloned().unwrap_or_default();
        let mut items = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let product = store
                .products
                .iter()
                .find(|p| p.id == product_id)
                .cloned()
                .ok_or(ShopError::NotFound("product"))?;
            items.push(CartItem { product, quantity });
        }
        Ok(items)
    }

    async fn create_order(
        &self,
        user_id: i64,
        delivery_info: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Order, ShopError> {
        let mut store = self.inner.lock().unwrap();
        if !store.users.contains_key(&user_id) {
            return Err(ShopError::NotFound("user"));
        }

        let cart = store.carts.remove(&user_id).unwrap_or_default();
        let mut lines = Vec::with_capacity(cart.len());
        for (product_id, quantity) in cart {
            let product = store
                .products
                .iter()
                .find(|p| p.id == product_id)
                .ok_or(ShopError::NotFound("product"))?;
            lines.push(OrderLine {
                product_id,
                name: product.name.clone(),
                quantity,
                price_cents: product.price_cents,
            });
        }

        let order = Order {
            id: store.alloc_id(),
            user_id,
            created_at,
            delivery_info: delivery_info.to_string(),
            payment_status: PaymentStatus::Pending,
            lines,
        };
        store.orders.push(order.clone());
        Ok(order)
    }

    async fn latest_order(&self, user_id: i64) -> Result<Option<Order>, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .next_back()
            .cloned())
    }

    async fn update_payment_status(
        &self,
        order_id: i64,
        status: PaymentStatus,
    ) -> Result<(), ShopError> {
        let mut store = self.inner.lock().unwrap();
        let order = store
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(ShopError::NotFound("order"))?;
        order.payment_status = status;
        Ok(())
    }

    async fn list_faq(&self) -> Result<Vec<FaqEntry>, ShopError> {
        let store = self.inner.lock().unwrap();
        Ok(store.faq.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_to_cart_merges_additively() -> Result<(), ShopError> {
        let repo = MemoryRepository::new();
        let cat = repo.seed_category("Tools");
        let sub = repo.seed_subcategory(cat, "Hand tools");
        let product = repo.seed_product(sub, "Hammer", 1500);

        repo.add_to_cart(7, product, 3).await?;
        repo.add_to_cart(7, product, 2).await?;

        let cart = repo.list_cart(7).await?;
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_set_cart_quantity_overwrites() -> Result<(), ShopError> {
        let repo = MemoryRepository::new();
        let cat = repo.seed_category("Tools");
        let sub = repo.seed_subcategory(cat, "Hand tools");
        let product = repo.seed_product(sub, "Hammer", 1500);

        repo.add_to_cart(7, product, 3).await?;
        repo.set_cart_quantity(7, product, 1).await?;

        let cart = repo.list_cart(7).await?;
        assert_eq!(cart[0].quantity, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_absent_line_is_noop() -> Result<(), ShopError> {
        let repo = MemoryRepository::new();
        repo.remove_from_cart(7, 999).await?;
        assert!(repo.list_cart(7).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_order_snapshots_and_clears_cart() -> Result<(), ShopError> {
        let repo = MemoryRepository::new();
        let cat = repo.seed_category("Tools");
        let sub = repo.seed_subcategory(cat, "Hand tools");
        let hammer = repo.seed_product(sub, "Hammer", 1500);
        let saw = repo.seed_product(sub, "Saw", 2000);

        repo.upsert_user(&ShopUser {
            telegram_id: 7,
            username: None,
            first_name: "Ada".to_string(),
            last_name: None,
        })
        .await?;
        repo.add_to_cart(7, hammer, 2).await?;
        repo.add_to_cart(7, saw, 1).await?;

        let order = repo.create_order(7, "Baker St 221b", Utc::now()).await?;
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.total_cents(), 5000);
        assert!(repo.list_cart(7).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_order_requires_known_user() {
        let repo = MemoryRepository::new();
        let result = repo.create_order(404, "nowhere", Utc::now()).await;
        assert!(matches!(result, Err(ShopError::NotFound("user"))));
    }
}
