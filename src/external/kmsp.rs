use crate::config::KmspConfig;
use crate::error::{AppError, AppResult};
use crate::external::RemoteService;
use crate::utils::normalize_msisdn;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Uniform response envelope of the KMSP openapi endpoints. Transport-level
/// failures are folded into the same shape so callers never see a raw fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ApiEnvelope {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// String field lookup inside `data`.
    pub fn data_str(&self, key: &str) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get(key))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// The remote signals an expired/invalid token only through its error
    /// message, matched case-insensitively.
    pub fn is_invalid_token(&self) -> bool {
        !self.status && self.message().to_lowercase().contains("invalid access token")
    }
}

/// Server-side authenticated state for one msisdn, as reported by the
/// access-token list endpoint. May expire at any time outside our control.
#[derive(Debug, Clone)]
pub struct RemoteSession {
    pub token: String,
    pub session_id: String,
}

/// Client for the KMSP purchase/authentication service. All operations are
/// GET-style calls carrying the shared api key.
#[derive(Clone)]
pub struct KmspApi {
    client: Client,
    config: KmspConfig,
}

impl KmspApi {
    pub fn new(config: KmspConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("ppob-backend")
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, op: &str) -> String {
        self.config.base_url.replace("{op}", op)
    }

    async fn api_get(&self, op: &str, params: &[(&str, String)]) -> ApiEnvelope {
        let url = self.endpoint(op);
        let mut query: Vec<(&str, String)> = params.to_vec();
        query.push(("api_key", self.config.api_key.clone()));

        let response = match self.client.get(&url).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                log::error!("API request error ({op}): {e}");
                return ApiEnvelope::failure(format!("Gagal menghubungi server API: {e}"));
            }
        };

        if !response.status().is_success() {
            log::error!("API request failed ({op}): HTTP {}", response.status());
            return ApiEnvelope::failure(format!(
                "Gagal menghubungi server API: HTTP {}",
                response.status()
            ));
        }

        match response.json::<ApiEnvelope>().await {
            Ok(envelope) => envelope,
            Err(e) => {
                log::error!("API response decode error ({op}): {e}");
                ApiEnvelope::failure(format!("Gagal membaca respons server API: {e}"))
            }
        }
    }

    /// All currently-authenticated numbers with their token and session id.
    pub async fn list_authenticated_numbers(&self) -> HashMap<String, RemoteSession> {
        let response = self.api_get("accesstokenlist", &[]).await;
        let mut numbers = HashMap::new();

        if !response.status {
            log::warn!("Access token list unavailable: {}", response.message());
            return numbers;
        }

        let Some(Value::Array(items)) = response.data else {
            return numbers;
        };
        for item in items {
            let (Some(msisdn), Some(token)) = (
                item.get("msisdn").and_then(|v| v.as_str()),
                item.get("token").and_then(|v| v.as_str()),
            ) else {
                continue;
            };
            let session_id = item
                .get("session_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            numbers.insert(
                msisdn.to_string(),
                RemoteSession {
                    token: token.to_string(),
                    session_id: session_id.to_string(),
                },
            );
        }
        numbers
    }

    /// Token refresh via the login endpoint (extend session).
    pub async fn extend_session(&self, phone: &str, session_id: &str, token: &str) -> ApiEnvelope {
        self.api_get(
            "login",
            &[
                ("phone", phone.to_string()),
                ("method", "LOGIN_BY_ACCESS_TOKEN".to_string()),
                ("auth_id", format!("{session_id}:{token}")),
            ],
        )
        .await
    }

    async fn purchase_once(
        &self,
        package_code: &str,
        phone: &str,
        access_token: &str,
        payment_method: &str,
        fee: i64,
    ) -> ApiEnvelope {
        self.api_get(
            "packagepurchase",
            &[
                ("package_code", package_code.to_string()),
                ("phone", phone.to_string()),
                ("access_token", access_token.to_string()),
                ("payment_method", payment_method.to_string()),
                ("price_or_fee", fee.to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl RemoteService for KmspApi {
    async fn request_otp(&self, phone: &str) -> ApiEnvelope {
        self.api_get("otp", &[("phone", phone.to_string())]).await
    }

    async fn login_with_otp(&self, phone: &str, auth_id: &str, code: &str) -> ApiEnvelope {
        self.api_get(
            "login",
            &[
                ("phone", phone.to_string()),
                ("method", "OTP".to_string()),
                ("auth_id", auth_id.to_string()),
                ("otp", code.to_string()),
            ],
        )
        .await
    }

    async fn subscriber_info(&self, access_token: &str) -> ApiEnvelope {
        self.api_get("subscriberinfo", &[("access_token", access_token.to_string())])
            .await
    }

    async fn subscriber_location(&self, access_token: &str) -> ApiEnvelope {
        self.api_get(
            "subscriberlocation",
            &[("access_token", access_token.to_string())],
        )
        .await
    }

    async fn quota_details(&self, access_token: &str) -> ApiEnvelope {
        self.api_get("quotadetails", &[("access_token", access_token.to_string())])
            .await
    }

    async fn unreg_package(&self, access_token: &str, encrypted_code: &str) -> ApiEnvelope {
        self.api_get(
            "packageunreg",
            &[
                ("access_token", access_token.to_string()),
                ("encrypted_package_code", encrypted_code.to_string()),
            ],
        )
        .await
    }

    async fn purchase(
        &self,
        package_code: &str,
        phone: &str,
        payment_method: &str,
        fee: i64,
    ) -> ApiEnvelope {
        let phone = normalize_msisdn(phone);

        let sessions = self.list_authenticated_numbers().await;
        let Some(session) = sessions.get(&phone) else {
            return ApiEnvelope::failure("Nomor ini belum login OTP atau token expired.");
        };

        let mut access_token = session.token.clone();
        // Bounded refresh policy: at most one extend + retry cycle.
        let mut refresh_budget: u8 = 1;

        loop {
            let result = self
                .purchase_once(package_code, &phone, &access_token, payment_method, fee)
                .await;

            if result.is_invalid_token() && refresh_budget > 0 {
                refresh_budget -= 1;
                log::warn!("Access token for {phone} rejected, extending session");
                let extended = self
                    .extend_session(&phone, &session.session_id, &access_token)
                    .await;
                if extended.status
                    && let Some(new_token) = extended.data_str("access_token")
                {
                    access_token = new_token;
                    continue;
                }
                log::warn!("Session extension for {phone} failed: {}", extended.message());
            }

            return result;
        }
    }
}
