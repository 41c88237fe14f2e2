use serde::{Deserialize, Serialize};

/// Catalog entry for a purchasable data package. Read-only during a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub code: String,
    pub name: String,
    /// Base list price in rupiah.
    pub price: i64,
    /// Per-package override; wins over the base price when present.
    pub override_price: Option<i64>,
    /// Cost basis forwarded to the provider, absent means 0.
    pub provider_fee: Option<i64>,
}

impl Package {
    /// The price shown to the user and charged against the balance.
    pub fn final_price(&self) -> i64 {
        self.override_price.unwrap_or(self.price)
    }

    pub fn fee(&self) -> i64 {
        self.provider_fee.unwrap_or(0)
    }
}
