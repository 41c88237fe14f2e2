pub mod kmsp;

pub use kmsp::{ApiEnvelope, KmspApi, RemoteSession};

use async_trait::async_trait;

/// Operations the conversation core consumes from the remote
/// purchase/authentication service. Every call resolves to a uniform
/// [`ApiEnvelope`]; transport faults never escape as raw errors.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn request_otp(&self, phone: &str) -> ApiEnvelope;

    async fn login_with_otp(&self, phone: &str, auth_id: &str, code: &str) -> ApiEnvelope;

    async fn subscriber_info(&self, access_token: &str) -> ApiEnvelope;

    async fn subscriber_location(&self, access_token: &str) -> ApiEnvelope;

    async fn quota_details(&self, access_token: &str) -> ApiEnvelope;

    async fn unreg_package(&self, access_token: &str, encrypted_code: &str) -> ApiEnvelope;

    /// Purchase with the token-refresh-and-retry protocol applied.
    async fn purchase(
        &self,
        package_code: &str,
        phone: &str,
        payment_method: &str,
        fee: i64,
    ) -> ApiEnvelope;
}
