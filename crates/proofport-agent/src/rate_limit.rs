use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::store::KeyValueStore;

/// Fixed-window request counter over the shared store: increment, set the
/// window expiry only on the first increment, reject past the limit with the
/// window's remaining seconds.
#[derive(Clone)]
pub struct RateLimiter<S> {
    store: Arc<S>,
    max_requests: u32,
    window_seconds: u64,
}

impl<S: KeyValueStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, max_requests: u32, window_seconds: u64) -> Self {
        Self {
            store,
            max_requests,
            window_seconds,
        }
    }

    pub async fn check(&self, key: &str) -> Result<()> {
        let counter_key = format!("ratelimit:{}", key.to_lowercase());
        let count = self.store.incr(&counter_key).await?;
        if count == 1 {
            self.store
                .expire(&counter_key, self.window_seconds)
                .await?;
        }

        if count > i64::from(self.max_requests) {
            let remaining = self.store.ttl(&counter_key).await?;
            let retry_after_secs = if remaining > 0 {
                remaining as u64
            } else {
                self.window_seconds
            };
            tracing::warn!(key, count, "rate limit exceeded");
            return Err(AgentError::RateLimited { retry_after_secs });
        }
        Ok(())
    }
}
