//! Shared in-memory collaborators for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use teloxide::types::{InlineKeyboardButtonKind, InlineKeyboardMarkup};

use teleshop::bot::AppContext;
use teleshop::config::Config;
use teleshop::errors::ShopError;
use teleshop::fulfillment::FulfillmentLedger;
use teleshop::messenger::{InlineAnswer, Messenger};
use teleshop::models::PaymentStatus;
use teleshop::payment::{PaymentGateway, PaymentIntent};
use teleshop::repository::MemoryRepository;
use teleshop::screen::ScreenRegistry;
use teleshop::session::SessionStore;
use teleshop::subscription::SubscriptionGate;

/// One message captured by the recording transport.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub id: i32,
    pub user_id: i64,
    pub text: String,
    pub photo: Option<String>,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl SentMessage {
    pub fn url_button_count(&self) -> usize {
        self.buttons_matching(|kind| matches!(kind, InlineKeyboardButtonKind::Url(_)))
    }

    pub fn callback_button_count(&self) -> usize {
        self.buttons_matching(|kind| matches!(kind, InlineKeyboardButtonKind::CallbackData(_)))
    }

    fn buttons_matching(&self, pred: impl Fn(&InlineKeyboardButtonKind) -> bool) -> usize {
        self.keyboard
            .as_ref()
            .map(|kb| {
                kb.inline_keyboard
                    .iter()
                    .flatten()
                    .filter(|b| pred(&b.kind))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Transport double: hands out sequential message ids and records
/// everything.
#[derive(Default)]
pub struct RecordingMessenger {
    next_id: AtomicI32,
    pub sent: Mutex<Vec<SentMessage>>,
    pub deleted: Mutex<Vec<(i64, i32)>>,
    pub inline_answers: Mutex<Vec<(String, Vec<InlineAnswer>)>>,
    pub fail_deletes: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_send(
        &self,
        user_id: i64,
        text: &str,
        photo: Option<String>,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> i32 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(SentMessage {
            id,
            user_id,
            text: text.to_string(),
            photo,
            keyboard,
        });
        id
    }

    pub fn messages_for(&self, user_id: i64) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn last_message(&self, user_id: i64) -> SentMessage {
        self.messages_for(user_id)
            .pop()
            .expect("no message was sent")
    }

    pub fn deleted_ids(&self, user_id: i64) -> Vec<i32> {
        self.deleted
            .lock()
            .unwrap()
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, mid)| *mid)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i32, ShopError> {
        Ok(self.record_send(user_id, text, None, keyboard))
    }

    async fn send_photo(
        &self,
        user_id: i64,
        photo: &str,
        caption: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<i32, ShopError> {
        Ok(self.record_send(user_id, caption, Some(photo.to_string()), keyboard))
    }

    async fn edit_text(
        &self,
        _user_id: i64,
        _message_id: i32,
        _text: &str,
        _keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<(), ShopError> {
        Ok(())
    }

    async fn delete_message(&self, user_id: i64, message_id: i32) -> Result<(), ShopError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ShopError::Transport("delete refused".to_string()));
        }
        self.deleted.lock().unwrap().push((user_id, message_id));
        Ok(())
    }

    async fn answer_inline_query(
        &self,
        query_id: &str,
        results: Vec<InlineAnswer>,
    ) -> Result<(), ShopError> {
        self.inline_answers
            .lock()
            .unwrap()
            .push((query_id.to_string(), results));
        Ok(())
    }
}

/// Payment provider double with a settable status.
pub struct StubGateway {
    pub status: Mutex<PaymentStatus>,
    pub created: Mutex<Vec<(i64, String)>>,
    pub fail_polls_remaining: Mutex<u32>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            status: Mutex::new(PaymentStatus::Pending),
            created: Mutex::new(Vec::new()),
            fail_polls_remaining: Mutex::new(0),
        }
    }
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: PaymentStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment(
        &self,
        amount_cents: i64,
        _currency: &str,
        _description: &str,
        idempotency_key: &str,
    ) -> Result<PaymentIntent, ShopError> {
        self.created
            .lock()
            .unwrap()
            .push((amount_cents, idempotency_key.to_string()));
        Ok(PaymentIntent {
            payment_id: format!("pay-{}", idempotency_key),
            redirect_url: format!("https://pay.example/{}", idempotency_key),
        })
    }

    async fn get_status(&self, _payment_id: &str) -> Result<PaymentStatus, ShopError> {
        let mut failures = self.fail_polls_remaining.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(ShopError::Payment("stub poll failure".to_string()));
        }
        Ok(*self.status.lock().unwrap())
    }
}

/// Subscription gate with a fixed answer.
pub struct FixedGate(pub bool);

#[async_trait]
impl SubscriptionGate for FixedGate {
    async fn is_subscribed(&self, _user_id: i64) -> bool {
        self.0
    }
}

/// Fully wired in-memory application context.
pub struct TestHarness {
    pub repo: Arc<MemoryRepository>,
    pub messenger: Arc<RecordingMessenger>,
    pub payments: Arc<StubGateway>,
    pub ctx: AppContext,
    ledger_dir: Arc<tempfile::TempDir>,
}

impl TestHarness {
    pub fn ledger_path(&self) -> std::path::PathBuf {
        self.ledger_dir.path().join("fulfillment.log")
    }

    /// Same shared state, different subscription answer.
    pub fn with_subscription(&self, subscribed: bool) -> AppContext {
        AppContext {
            subscriptions: Arc::new(FixedGate(subscribed)),
            ..self.ctx.clone()
        }
    }
}

pub fn harness() -> TestHarness {
    harness_with_subscription(true)
}

pub fn harness_with_subscription(subscribed: bool) -> TestHarness {
    let repo = Arc::new(MemoryRepository::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let payments = Arc::new(StubGateway::new());
    let ledger_dir = Arc::new(tempfile::tempdir().expect("tempdir"));

    let config = Config {
        ledger_path: ledger_dir.path().join("fulfillment.log"),
        payment_poll_interval: Duration::from_millis(10),
        payment_abandon_after: Duration::from_secs(5),
        ..Config::default()
    };

    let ctx = AppContext {
        repo: repo.clone(),
        messenger: messenger.clone(),
        payments: payments.clone(),
        subscriptions: Arc::new(FixedGate(subscribed)),
        screens: Arc::new(ScreenRegistry::new()),
        sessions: Arc::new(SessionStore::new()),
        ledger: Arc::new(FulfillmentLedger::new(ledger_dir.path().join("fulfillment.log"))),
        config: Arc::new(config),
    };

    TestHarness {
        repo,
        messenger,
        payments,
        ctx,
        ledger_dir,
    }
}
