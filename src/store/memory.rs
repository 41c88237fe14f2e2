use crate::error::AppResult;
use crate::models::{BalanceInfo, Package, TransactionRecord, UserAccount};
use crate::store::LedgerStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory ledger, the reference `LedgerStore` implementation. Also used
/// by the integration tests; a SQL-backed store plugs into the same trait.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    users: Arc<RwLock<HashMap<i64, UserAccount>>>,
    packages: Arc<RwLock<HashMap<String, Package>>>,
    transactions: Arc<RwLock<Vec<TransactionRecord>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog entry. Catalog management itself is out of scope.
    pub async fn insert_package(&self, package: Package) {
        let mut packages = self.packages.write().await;
        packages.insert(package.code.clone(), package);
    }

    /// Credit an account, creating it when missing. Seeding/test helper.
    pub async fn credit(&self, user_id: i64, amount: i64) {
        let mut users = self.users.write().await;
        let user = users.entry(user_id).or_insert_with(|| UserAccount {
            id: user_id,
            name: String::new(),
            username: None,
            balance: 0,
        });
        user.balance += amount;
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.transactions.read().await.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn find_or_create_user(
        &self,
        id: i64,
        name: &str,
        username: Option<&str>,
    ) -> AppResult<bool> {
        let mut users = self.users.write().await;
        if users.contains_key(&id) {
            return Ok(false);
        }
        users.insert(
            id,
            UserAccount {
                id,
                name: name.to_string(),
                username: username.map(|u| u.to_string()),
                balance: 0,
            },
        );
        log::info!("User {id} ({username:?}) added to ledger");
        Ok(true)
    }

    async fn list_active_packages(&self) -> AppResult<Vec<Package>> {
        let packages = self.packages.read().await;
        let mut list: Vec<Package> = packages.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn get_package(&self, code: &str) -> AppResult<Option<Package>> {
        let packages = self.packages.read().await;
        Ok(packages.get(code).cloned())
    }

    async fn get_balance(&self, user_id: i64) -> AppResult<Option<BalanceInfo>> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).map(|u| BalanceInfo {
            balance: u.balance,
            username: u.username.clone(),
        }))
    }

    async fn set_balance(&self, user_id: i64, new_balance: i64) -> AppResult<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.balance = new_balance;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_transaction(&self, record: TransactionRecord) -> AppResult<bool> {
        let mut transactions = self.transactions.write().await;
        transactions.push(record);
        Ok(true)
    }
}
