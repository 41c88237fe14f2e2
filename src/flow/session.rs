use crate::flow::state::FlowState;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Key of one conversation scratch space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: i64,
    pub chat_id: i64,
}

/// Per-conversation scratch state, created on first action and cleared on
/// completion, cancellation or idle timeout.
#[derive(Debug)]
pub struct FlowSession {
    pub state: FlowState,
    pub last_activity: Instant,
}

impl FlowSession {
    fn new() -> Self {
        Self {
            state: FlowState::Idle,
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Reset to `Idle`, dropping all staged data.
    pub fn clear(&mut self) {
        self.state = FlowState::Idle;
        self.touch();
    }
}

/// Keyed store of all live sessions. The per-session mutex serializes
/// transitions: the dispatcher holds it for the whole transition, so
/// overlapping inputs for one session are processed one at a time and the
/// idle sweep can never clear a session mid-transition.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionKey, Arc<Mutex<FlowSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, key: SessionKey) -> Arc<Mutex<FlowSession>> {
        self.sessions
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(FlowSession::new())))
            .clone()
    }

    /// Clear sessions idle for longer than `max_idle`. Sessions with a
    /// transition in flight are skipped and picked up on a later sweep.
    /// Returns the keys that were expired.
    pub fn sweep_idle(&self, max_idle: Duration) -> Vec<SessionKey> {
        let now = Instant::now();
        let mut expired = Vec::new();

        for entry in self.sessions.iter() {
            let Ok(mut session) = entry.value().try_lock() else {
                continue;
            };
            if session.state.is_idle() {
                continue;
            }
            if now.duration_since(session.last_activity) >= max_idle {
                session.clear();
                expired.push(*entry.key());
            }
        }

        if !expired.is_empty() {
            log::info!("Swept {} idle session(s)", expired.len());
        }
        expired
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweep_clears_expired_sessions() {
        let registry = SessionRegistry::new();
        let key = SessionKey {
            user_id: 1,
            chat_id: 1,
        };

        {
            let session = registry.entry(key);
            session.lock().await.state = FlowState::PurchaseAskPhone;
        }

        // A zero idle window expires everything that is not mid-transition.
        let expired = registry.sweep_idle(Duration::ZERO);
        assert_eq!(expired, vec![key]);

        let session = registry.entry(key);
        assert!(session.lock().await.state.is_idle());
    }

    #[tokio::test]
    async fn test_sweep_skips_sessions_with_transition_in_flight() {
        let registry = SessionRegistry::new();
        let key = SessionKey {
            user_id: 2,
            chat_id: 2,
        };

        let session = registry.entry(key);
        let mut guard = session.lock().await;
        guard.state = FlowState::PurchaseAskPhone;

        // Transition in progress: the guard is held, the sweep must skip.
        let expired = registry.sweep_idle(Duration::ZERO);
        assert!(expired.is_empty());
        assert_eq!(guard.state, FlowState::PurchaseAskPhone);
    }

    #[tokio::test]
    async fn test_sweep_leaves_recent_sessions_alone() {
        let registry = SessionRegistry::new();
        let key = SessionKey {
            user_id: 3,
            chat_id: 3,
        };

        {
            let session = registry.entry(key);
            session.lock().await.state = FlowState::OtpAskPhone;
        }

        let expired = registry.sweep_idle(Duration::from_secs(300));
        assert!(expired.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
