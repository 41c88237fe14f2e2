pub mod action;
pub mod package;
pub mod transaction;
pub mod user;

pub use action::*;
pub use package::*;
pub use transaction::*;
pub use user::*;
