//! Small key/value cache with optional per-entry expiry.
//!
//! The locale resolver is the only consumer. Entries stored without a TTL
//! live until [`Cache::forget`] or [`Cache::flush`] is called, which is what
//! the locale sync job does after refreshing the `locales` table.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tokio::time::Instant;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// `None` keeps the value until it is explicitly forgotten.
    fn put(&self, key: &str, value: String, ttl: Option<Duration>);

    fn forget(&self, key: &str);

    fn flush(&self);
}

struct Slot {
    value: String,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local [`Cache`]. Uses tokio's clock so expiry follows
/// `tokio::time::pause`/`advance` in tests.
#[derive(Default)]
pub struct MemoryCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let slots = self.slots.upgradable_read();
        let slot = slots.get(key)?;
        if !slot.is_expired(now) {
            return Some(slot.value.clone());
        }
        // The upgrade is atomic: no `put` can land between the expiry check
        // and the removal.
        RwLockUpgradableReadGuard::upgrade(slots).remove(key);
        None
    }

    fn put(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.slots
            .write()
            .insert(key.to_string(), Slot { value, expires_at });
    }

    fn forget(&self, key: &str) {
        self.slots.write().remove(key);
    }

    fn flush(&self) {
        self.slots.write().clear();
    }
}
