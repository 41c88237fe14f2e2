#![allow(dead_code)]

use async_trait::async_trait;
use ppob_backend::external::{ApiEnvelope, RemoteService};
use ppob_backend::flow::Dispatcher;
use ppob_backend::models::{ActionEnvelope, InboundAction, Package};
use ppob_backend::store::{InMemoryLedger, LedgerStore};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scriptable stand-in for the remote purchase/auth service. Each operation
/// returns the configured envelope and counts its calls.
pub struct MockRemote {
    otp: Mutex<ApiEnvelope>,
    login: Mutex<ApiEnvelope>,
    purchase: Mutex<ApiEnvelope>,
    info: Mutex<ApiEnvelope>,
    location: Mutex<ApiEnvelope>,
    quota: Mutex<ApiEnvelope>,
    unreg: Mutex<ApiEnvelope>,
    pub otp_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub purchase_calls: AtomicUsize,
}

impl Default for MockRemote {
    fn default() -> Self {
        let unconfigured = || Mutex::new(ApiEnvelope::failure("not configured"));
        Self {
            otp: unconfigured(),
            login: unconfigured(),
            purchase: unconfigured(),
            info: unconfigured(),
            location: unconfigured(),
            quota: unconfigured(),
            unreg: unconfigured(),
            otp_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            purchase_calls: AtomicUsize::new(0),
        }
    }
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_otp(&self, envelope: ApiEnvelope) {
        *self.otp.lock().unwrap() = envelope;
    }

    pub fn set_login(&self, envelope: ApiEnvelope) {
        *self.login.lock().unwrap() = envelope;
    }

    pub fn set_purchase(&self, envelope: ApiEnvelope) {
        *self.purchase.lock().unwrap() = envelope;
    }

    pub fn set_info(&self, envelope: ApiEnvelope) {
        *self.info.lock().unwrap() = envelope;
    }

    pub fn set_location(&self, envelope: ApiEnvelope) {
        *self.location.lock().unwrap() = envelope;
    }

    pub fn set_quota(&self, envelope: ApiEnvelope) {
        *self.quota.lock().unwrap() = envelope;
    }

    pub fn set_unreg(&self, envelope: ApiEnvelope) {
        *self.unreg.lock().unwrap() = envelope;
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn request_otp(&self, _phone: &str) -> ApiEnvelope {
        self.otp_calls.fetch_add(1, Ordering::SeqCst);
        self.otp.lock().unwrap().clone()
    }

    async fn login_with_otp(&self, _phone: &str, _auth_id: &str, _code: &str) -> ApiEnvelope {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login.lock().unwrap().clone()
    }

    async fn subscriber_info(&self, _access_token: &str) -> ApiEnvelope {
        self.info.lock().unwrap().clone()
    }

    async fn subscriber_location(&self, _access_token: &str) -> ApiEnvelope {
        self.location.lock().unwrap().clone()
    }

    async fn quota_details(&self, _access_token: &str) -> ApiEnvelope {
        self.quota.lock().unwrap().clone()
    }

    async fn unreg_package(&self, _access_token: &str, _encrypted_code: &str) -> ApiEnvelope {
        self.unreg.lock().unwrap().clone()
    }

    async fn purchase(
        &self,
        _package_code: &str,
        _phone: &str,
        _payment_method: &str,
        _fee: i64,
    ) -> ApiEnvelope {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        self.purchase.lock().unwrap().clone()
    }
}

pub const USER_ID: i64 = 42;
pub const CHAT_ID: i64 = 7;

pub fn package(code: &str, name: &str, price: i64, fee: i64) -> Package {
    Package {
        code: code.to_string(),
        name: name.to_string(),
        price,
        override_price: None,
        provider_fee: Some(fee),
    }
}

pub async fn seeded_ledger(balance: i64, packages: Vec<Package>) -> InMemoryLedger {
    let ledger = InMemoryLedger::new();
    ledger
        .find_or_create_user(USER_ID, "Test User", Some("tester"))
        .await
        .unwrap();
    ledger.credit(USER_ID, balance).await;
    for pkg in packages {
        ledger.insert_package(pkg).await;
    }
    ledger
}

pub fn dispatcher(ledger: InMemoryLedger, remote: Arc<MockRemote>) -> Dispatcher {
    Dispatcher::new(Arc::new(ledger), remote, "DANA".to_string())
}

pub fn text(text: &str) -> ActionEnvelope {
    envelope(InboundAction::Text {
        text: text.to_string(),
    })
}

pub fn choice(data: &str) -> ActionEnvelope {
    envelope(InboundAction::Choice {
        data: data.to_string(),
    })
}

pub fn cancel() -> ActionEnvelope {
    envelope(InboundAction::Cancel)
}

pub fn session_timeout() -> ActionEnvelope {
    envelope(InboundAction::SessionTimeout)
}

fn envelope(action: InboundAction) -> ActionEnvelope {
    ActionEnvelope {
        user_id: USER_ID,
        chat_id: CHAT_ID,
        name: "Test User".to_string(),
        username: Some("tester".to_string()),
        action,
    }
}
