use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::error::Result;

/// TTL report following the usual key-value store convention: `-2` for a
/// missing key, `-1` for a key without expiry, otherwise remaining seconds.
pub const TTL_MISSING: i64 = -2;
pub const TTL_NO_EXPIRY: i64 = -1;

/// The shared mutable resource every operation persists through. All agent
/// state lives behind this trait; no in-process memory is authoritative.
///
/// `take` is the atomic get-and-delete used for one-time consumption of
/// signing sessions, so two concurrent consumers cannot both observe the
/// same record.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;
    async fn del(&self, key: &str) -> Result<bool>;
    async fn take(&self, key: &str) -> Result<Option<String>>;
    async fn incr(&self, key: &str) -> Result<i64>;
    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()>;
    async fn ttl(&self, key: &str) -> Result<i64>;
    /// Publishes a payload on a channel, returning the subscriber count.
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize>;
}

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    deadline: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }
}

/// In-memory store used by tests and single-process deployments. Pub/sub
/// fans out through per-channel broadcast senders created lazily.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
    channel_capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            channels: RwLock::new(HashMap::new()),
            channel_capacity: 64,
        })
    }

    /// Subscribe to a channel's events (streaming consumers and tests).
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    fn live_entry(entries: &mut HashMap<String, Entry>, key: &str) -> Option<Entry> {
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        Ok(Self::live_entry(&mut entries, key).map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let deadline = ttl_seconds.map(|s| Instant::now() + Duration::from_secs(s));
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                deadline,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let live = Self::live_entry(&mut entries, key).is_some();
        entries.remove(key);
        Ok(live)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        let entry = Self::live_entry(&mut entries, key);
        entries.remove(key);
        Ok(entry.map(|e| e.value))
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        let current = Self::live_entry(&mut entries, key)
            .and_then(|e| e.value.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + 1;
        let deadline = entries.get(key).and_then(|e| e.deadline);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                deadline,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if Self::live_entry(&mut entries, key).is_some() {
            if let Some(entry) = entries.get_mut(key) {
                entry.deadline = Some(Instant::now() + Duration::from_secs(ttl_seconds));
            }
        }
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        match Self::live_entry(&mut entries, key) {
            None => Ok(TTL_MISSING),
            Some(Entry { deadline: None, .. }) => Ok(TTL_NO_EXPIRY),
            Some(Entry {
                deadline: Some(deadline),
                ..
            }) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                // round up so a live key never reports zero
                Ok(remaining.as_secs() as i64 + i64::from(remaining.subsec_nanos() > 0))
            }
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<usize> {
        let channels = self.channels.read().await;
        let Some(sender) = channels.get(channel) else {
            return Ok(0);
        };
        // send only fails with zero receivers, which is not an error here
        Ok(sender.send(payload.to_string()).unwrap_or(0))
    }
}
