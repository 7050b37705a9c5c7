pub mod model;

use chrono::{DateTime, Duration, Utc};

use crate::storage::MemoryCache;

use model::{ConversationState, RegistrationStep};

/// Per-user conversation state, owned by the controller and keyed by user id.
#[derive(Clone)]
pub struct DialogueService {
    sessions: MemoryCache<ConversationState>,
    idle_timeout: Duration,
}

impl DialogueService {
    pub fn new(capacity: usize, idle_timeout: Duration) -> Self {
        info!("Initializing DialogueService...");
        Self {
            sessions: MemoryCache::new(capacity),
            idle_timeout,
        }
    }

    pub fn get(&self, user_id: &str) -> ConversationState {
        self.sessions.get(user_id).unwrap_or_default()
    }

    pub fn update(&self, user_id: &str, mut state: ConversationState) {
        if state.registration_step == RegistrationStep::None {
            self.sessions.del(user_id);
            return;
        }

        state.updated_at = Utc::now();
        self.sessions.set(user_id, state);
    }

    /// Evicts conversations untouched for longer than the idle timeout.
    pub fn cleanup_stale(&self, now: DateTime<Utc>) -> usize {
        let idle_timeout = self.idle_timeout;
        let evicted = self
            .sessions
            .retain(|_, state| now - state.updated_at <= idle_timeout);

        if evicted > 0 {
            info!(
                "Evicted {} idle conversations, {} remaining",
                evicted,
                self.sessions.len()
            );
        }

        evicted
    }
}
