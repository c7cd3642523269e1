use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use uuid::Uuid;

type TypingKey = (Uuid, Uuid);

/// Per (user, conversation) cap on typing-start events.
pub struct TypingThrottle {
    limiter: RateLimiter<TypingKey, DefaultKeyedStateStore<TypingKey>, DefaultClock>,
}

impl TypingThrottle {
    pub fn new(events_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(events_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    pub fn allow(&self, user_id: Uuid, conversation_id: Uuid) -> bool {
        self.limiter.check_key(&(user_id, conversation_id)).is_ok()
    }

    /// Drop keys whose bucket has fully refilled.
    pub fn evict_idle(&self) -> usize {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.limiter.len()
    }
}
