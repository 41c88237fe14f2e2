use serde::{Deserialize, Serialize};

/// One inbound user action, as delivered by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundAction {
    /// Free text typed by the user (phone numbers, OTP codes).
    Text { text: String },
    /// Discrete choice selection; `data` is the choice payload previously
    /// offered in a [`Reply`].
    Choice { data: String },
    /// Explicit cancellation, valid from any state.
    Cancel,
    /// Scheduled idle-session expiry, not a user action. Equivalent to
    /// cancellation in effect.
    SessionTimeout,
}

/// Transport envelope around an action: who acted, in which conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEnvelope {
    pub user_id: i64,
    pub chat_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(flatten)]
    pub action: InboundAction,
}

/// What the conversation projects back to the user: plain text plus the
/// choice payloads the transport may offer. No formatting or rendering
/// happens here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ReplyOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyOption {
    pub label: String,
    pub data: String,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.options.push(ReplyOption {
            label: label.into(),
            data: data.into(),
        });
        self
    }
}
