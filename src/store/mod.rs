pub mod memory;

pub use memory::InMemoryLedger;

use crate::error::AppResult;
use crate::models::{BalanceInfo, Package, TransactionRecord};
use async_trait::async_trait;

/// Narrow interface to the balance/catalog/ledger store. The persistence
/// engine behind it is out of scope; anything that can answer these calls
/// can back the conversation core.
///
/// Balance updates join on the immutable numeric user id. The store does
/// not enforce non-negative balances; the core checks before settling.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Register the user if unknown. Returns true when a row was created.
    async fn find_or_create_user(
        &self,
        id: i64,
        name: &str,
        username: Option<&str>,
    ) -> AppResult<bool>;

    /// Active catalog, ordered by package name.
    async fn list_active_packages(&self) -> AppResult<Vec<Package>>;

    async fn get_package(&self, code: &str) -> AppResult<Option<Package>>;

    async fn get_balance(&self, user_id: i64) -> AppResult<Option<BalanceInfo>>;

    /// Blind-write of the new balance. Returns true when a row was updated.
    ///
    /// There is no compare-and-swap here: concurrent settlements for the
    /// same user can race (read-compute-write). Accepted gap, see DESIGN.md.
    async fn set_balance(&self, user_id: i64, new_balance: i64) -> AppResult<bool>;

    /// Append-only transaction log. Returns true when the row was written.
    async fn append_transaction(&self, record: TransactionRecord) -> AppResult<bool>;
}
