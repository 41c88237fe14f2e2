/// Conversation position for one (user, chat) pair. Each variant carries
/// exactly the data staged by the states before it, so a state can never
/// read a field that was not set earlier in the same flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FlowState {
    /// No flow in progress; the session holds nothing.
    #[default]
    Idle,

    // Purchase flow: AskPhone -> AskPackage -> Confirm -> terminal.
    PurchaseAskPhone,
    PurchaseAskPackage {
        phone: String,
    },
    PurchaseConfirm {
        phone: String,
        package_code: String,
        package_name: String,
        price_final: i64,
        provider_fee: i64,
    },

    // OTP login flow: AskPhone -> AskCode -> Panel.
    OtpAskPhone,
    OtpAskCode {
        phone: String,
        auth_id: String,
    },

    /// Logged in; panel actions are available while the token lasts.
    Panel {
        phone: String,
        access_token: String,
    },
}

impl FlowState {
    pub fn is_idle(&self) -> bool {
        matches!(self, FlowState::Idle)
    }
}
