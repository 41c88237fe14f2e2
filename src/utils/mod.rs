pub mod id_generator;
pub mod phone;

pub use id_generator::{generate_transaction_id, generate_wallet_id};
pub use phone::*;
