pub mod config;
pub mod error;
pub mod external;
pub mod flow;
pub mod handlers;
pub mod models;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
