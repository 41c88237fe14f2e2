use serde::{Deserialize, Serialize};

/// Account as seen by the ledger. `id` is the stable identity from the chat
/// platform; the username is mutable display data and must never be used as
/// a join key for balance updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub name: String,
    pub username: Option<String>,
    /// Rupiah. The core rejects purchases that would take this negative.
    pub balance: i64,
}

/// Balance snapshot returned by the ledger for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub balance: i64,
    pub username: Option<String>,
}
