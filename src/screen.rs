//! Screen Registry: which messages currently form a user's visible screen.
//!
//! A screen may span several messages (a product page is N photo cards
//! plus a navigation footer). Before a new screen is rendered the previous
//! one is retired: every recorded id is requested for deletion, failures
//! are logged and swallowed, and the record is reset regardless of the
//! deletion outcomes.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::messenger::Messenger;

/// Per-user record of the message ids making up the active screen.
#[derive(Default)]
pub struct ScreenRegistry {
    screens: Mutex<HashMap<i64, Vec<i32>>>,
}

impl ScreenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message id to the current screen. Call only after the
    /// corresponding send succeeded, so no phantom ids are recorded.
    pub fn record(&self, user_id: i64, message_id: i32) {
        let mut screens = self.screens.lock().unwrap();
        screens.entry(user_id).or_default().push(message_id);
        debug!(user_id = %user_id, message_id = %message_id, "Recorded screen message");
    }

    /// Retire the user's previous screen. Deletion is best-effort per
    /// message; after all attempts the recorded set is empty. A user with
    /// no recorded screen is a no-op.
    pub async fn clear(&self, messenger: &dyn Messenger, user_id: i64) {
        let ids = {
            let mut screens = self.screens.lock().unwrap();
            screens.remove(&user_id).unwrap_or_default()
        };

        for message_id in ids {
            if let Err(e) = messenger.delete_message(user_id, message_id).await {
                warn!(user_id = %user_id, message_id = %message_id, error = %e,
                    "Failed to delete screen message");
            }
        }
    }

    /// Single-slot replace: retire the previous screen and make
    /// `message_id` the whole new one.
    pub async fn replace(&self, messenger: &dyn Messenger, user_id: i64, message_id: i32) {
        self.clear(messenger, user_id).await;
        self.record(user_id, message_id);
    }

    /// Snapshot of the currently recorded ids for a user.
    pub fn current(&self, user_id: i64) -> Vec<i32> {
        let screens = self.screens.lock().unwrap();
        screens.get(&user_id).cloned().unwrap_or_default()
    }
}
