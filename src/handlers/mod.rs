pub mod action;

pub use action::action_config;
