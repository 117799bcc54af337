//! Ephemeral per-user conversation state.
//!
//! Pending entries live only between the prompt and the user's next input.
//! They are process-local and lost on restart; the user simply restarts
//! the flow. The store is injected, never a process-wide global.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Product data captured when a cart flow begins. Deliberately not
/// re-fetched later in the flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
}

/// Where a user currently is in the cart conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum CartSession {
    /// "How many?" was asked for a product being added.
    AwaitingQuantity { product: ProductSnapshot },
    /// Quantity received, confirmation button shown.
    AwaitingConfirmation {
        product: ProductSnapshot,
        quantity: i32,
    },
    /// "How many?" was asked for an existing cart line.
    AwaitingUpdateQuantity { product_id: i64 },
}

/// Pending state for every user, plus a per-user gate that serializes
/// handler execution for the same user.
#[derive(Default)]
pub struct SessionStore {
    cart: Mutex<HashMap<i64, CartSession>>,
    checkout: Mutex<HashSet<i64>>,
    gates: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or restart a cart flow. An existing pending entry for the
    /// user is silently replaced (last write wins).
    pub fn set_cart(&self, user_id: i64, session: CartSession) {
        self.cart.lock().unwrap().insert(user_id, session);
    }

    pub fn cart(&self, user_id: i64) -> Option<CartSession> {
        self.cart.lock().unwrap().get(&user_id).cloned()
    }

    /// Remove and return the pending cart entry, if any.
    pub fn take_cart(&self, user_id: i64) -> Option<CartSession> {
        self.cart.lock().unwrap().remove(&user_id)
    }

    pub fn has_cart(&self, user_id: i64) -> bool {
        self.cart.lock().unwrap().contains_key(&user_id)
    }

    /// Mark the user as owing delivery info. Also discards any pending
    /// cart entry so free text is routed unambiguously.
    pub fn begin_checkout(&self, user_id: i64) {
        self.cart.lock().unwrap().remove(&user_id);
        self.checkout.lock().unwrap().insert(user_id);
    }

    pub fn has_checkout(&self, user_id: i64) -> bool {
        self.checkout.lock().unwrap().contains(&user_id)
    }

    /// Clear the pending checkout; returns whether one existed.
    pub fn take_checkout(&self, user_id: i64) -> bool {
        self.checkout.lock().unwrap().remove(&user_id)
    }

    /// Per-user lock. All handling for one user runs under this lock so
    /// pending-state reads and writes never interleave for the same user;
    /// different users proceed in parallel.
    pub fn user_gate(&self, user_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap();
        gates
            .entry(user_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
