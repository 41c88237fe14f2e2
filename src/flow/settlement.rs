use crate::error::{AppError, AppResult};
use crate::external::RemoteService;
use crate::models::{TransactionRecord, TrxStatus};
use crate::store::LedgerStore;
use crate::utils::{generate_transaction_id, generate_wallet_id};
use chrono::Utc;
use std::sync::Arc;

/// Fully staged purchase, as assembled by the conversation flow.
#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    pub phone: String,
    pub package_code: String,
    pub package_name: String,
    pub price_final: i64,
    pub provider_fee: i64,
}

/// User-facing result of one settlement attempt.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub success: bool,
    pub message: String,
    pub transaction_id: String,
}

/// Settles one confirmed purchase: remote call, balance reconciliation,
/// transaction log. Exactly one remote attempt per confirmation (the retry
/// protocol lives inside the remote client) and exactly one transaction
/// record per attempt.
#[derive(Clone)]
pub struct SettlementCoordinator {
    store: Arc<dyn LedgerStore>,
    remote: Arc<dyn RemoteService>,
    payment_method: String,
}

impl SettlementCoordinator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        remote: Arc<dyn RemoteService>,
        payment_method: String,
    ) -> Self {
        Self {
            store,
            remote,
            payment_method,
        }
    }

    pub async fn settle(&self, user_id: i64, order: &PurchaseOrder) -> AppResult<SettlementOutcome> {
        // Re-read the balance at settlement time, not the value captured
        // earlier in the flow. Concurrent settlements for the same user can
        // still race between this read and the write below; accepted gap.
        let balance_info = self
            .store
            .get_balance(user_id)
            .await?
            .ok_or_else(|| AppError::StoreError(format!("User {user_id} not found")))?;

        if balance_info.balance < order.price_final {
            log::warn!(
                "Settlement rejected for user {user_id}: balance {} < price {}",
                balance_info.balance,
                order.price_final
            );
            return Ok(SettlementOutcome {
                success: false,
                message: format!(
                    "Saldo Anda (Rp{}) tidak cukup untuk paket ini.",
                    balance_info.balance
                ),
                transaction_id: String::new(),
            });
        }

        let result = self
            .remote
            .purchase(
                &order.package_code,
                &order.phone,
                &self.payment_method,
                order.provider_fee,
            )
            .await;

        let (message, status) = if result.status {
            let new_balance = balance_info.balance - order.price_final;
            match self.store.set_balance(user_id, new_balance).await {
                Ok(true) => {
                    log::info!(
                        "User {user_id} balance {} -> {new_balance} for package {}",
                        balance_info.balance,
                        order.package_code
                    );
                }
                Ok(false) => {
                    log::error!(
                        "Balance update for user {user_id} matched no row after a successful purchase"
                    );
                }
                Err(e) => {
                    log::error!("Balance update for user {user_id} failed: {e}");
                }
            }
            let message = if result.message().is_empty() {
                "Sukses!".to_string()
            } else {
                result.message().to_string()
            };
            (message, TrxStatus::Success)
        } else {
            let message = if result.message().is_empty() {
                "Gagal dari server.".to_string()
            } else {
                result.message().to_string()
            };
            (message, TrxStatus::Error)
        };

        let transaction_id = result
            .data_str("trx_id")
            .unwrap_or_else(generate_transaction_id);

        let now = Utc::now();
        let record = TransactionRecord {
            wallet_id: generate_wallet_id(),
            transaction_id: transaction_id.clone(),
            user: balance_info.username.clone(),
            package_code: order.package_code.clone(),
            package_name: order.package_name.clone(),
            destination: order.phone.clone(),
            note: message.clone(),
            price: order.price_final,
            status,
            source: TransactionRecord::SOURCE.to_string(),
            trx_type: TransactionRecord::TRX_TYPE.to_string(),
            created_at: now,
            updated_at: now,
            provider: TransactionRecord::PROVIDER.to_string(),
        };

        // Best effort: a failed log write never rolls back the balance and
        // never changes the user-visible outcome.
        match self.store.append_transaction(record).await {
            Ok(true) => {}
            Ok(false) => {
                log::error!("Transaction log write for {transaction_id} was not applied")
            }
            Err(e) => log::error!("Transaction log write for {transaction_id} failed: {e}"),
        }

        Ok(SettlementOutcome {
            success: status == TrxStatus::Success,
            message,
            transaction_id,
        })
    }
}
