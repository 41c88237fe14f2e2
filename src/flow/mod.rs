pub mod machine;
pub mod session;
pub mod settlement;
pub mod state;

pub use machine::Dispatcher;
pub use session::{FlowSession, SessionKey, SessionRegistry};
pub use settlement::{PurchaseOrder, SettlementCoordinator, SettlementOutcome};
pub use state::FlowState;
