use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrxStatus {
    Success,
    Error,
    Pending,
}

/// Append-only ledger row, written exactly once per completed purchase
/// attempt and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub wallet_id: String,
    pub transaction_id: String,
    /// Username at settlement time, kept for the operator's ledger view.
    pub user: Option<String>,
    pub package_code: String,
    pub package_name: String,
    /// Destination msisdn the package was sent to.
    pub destination: String,
    /// Message returned by the remote service for this attempt.
    pub note: String,
    pub price: i64,
    pub status: TrxStatus,
    pub source: String,
    pub trx_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub provider: String,
}

impl TransactionRecord {
    pub const SOURCE: &'static str = "telegram_bot";
    pub const TRX_TYPE: &'static str = "prepaid";
    pub const PROVIDER: &'static str = "XL/AXIS";
}
