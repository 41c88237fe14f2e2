use rand::Rng;

/// Generate a ledger wallet id: `W` followed by 9 digits.
pub fn generate_wallet_id() -> String {
    let mut rng = rand::thread_rng();
    format!("W{:09}", rng.gen_range(0..1_000_000_000u64))
}

/// Generate a fallback transaction id (`T` + 9 digits) for attempts where
/// the remote service did not return one.
pub fn generate_transaction_id() -> String {
    let mut rng = rand::thread_rng();
    format!("T{:09}", rng.gen_range(0..1_000_000_000u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_wallet_id() {
        let id = generate_wallet_id();
        assert_eq!(id.len(), 10);
        assert!(id.starts_with('W'));
        assert!(id[1..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_generate_transaction_id() {
        let id = generate_transaction_id();
        assert_eq!(id.len(), 10);
        assert!(id.starts_with('T'));
        assert!(id[1..].chars().all(|c| c.is_ascii_digit()));
    }
}
