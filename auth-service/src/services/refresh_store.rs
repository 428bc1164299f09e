use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::Clock;

/// Result of an atomic compare-and-swap on a family's current refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The presented id was current and has been replaced.
    Rotated,
    /// A different id was current: the presented token was already rotated
    /// away. The family has been removed in the same step.
    Superseded,
    /// The family has no current id (revoked, logged out, expired or never
    /// issued).
    Missing,
}

/// Per-family record of the one refresh token id that may still be used.
#[async_trait]
pub trait RefreshStateStore: Send + Sync {
    async fn get_current(&self, family_id: &str) -> Result<Option<String>, anyhow::Error>;

    async fn set_current(&self, family_id: &str, token_id: &str) -> Result<(), anyhow::Error>;

    /// Replace `expected` with `next` only if `expected` is current. On a
    /// mismatch the family is deleted. Read, write and delete are a single
    /// atomic step per family.
    async fn rotate(
        &self,
        family_id: &str,
        expected: &str,
        next: &str,
    ) -> Result<RotateOutcome, anyhow::Error>;

    async fn revoke(&self, family_id: &str) -> Result<(), anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[derive(Debug, Clone)]
struct FamilyEntry {
    token_id: String,
    expires_at: i64,
}

// Expired entries are swept once per this many writes.
const PRUNE_EVERY_WRITES: u64 = 256;

/// Process-local store. Each family lives in a DashMap shard, so a rotation
/// holds only that shard's lock and unrelated families proceed in parallel.
/// Entries expire with the refresh lifetime, like the Redis `EX` TTL.
pub struct InMemoryRefreshStore {
    families: DashMap<String, FamilyEntry>,
    ttl_seconds: i64,
    clock: Arc<dyn Clock>,
    writes: AtomicU64,
}

impl InMemoryRefreshStore {
    pub fn new(ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            families: DashMap::new(),
            ttl_seconds,
            clock,
            writes: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Drop every family whose refresh lifetime has run out.
    pub fn prune_expired(&self) -> usize {
        let now = self.now();
        let before = self.families.len();
        self.families.retain(|_, entry| entry.expires_at > now);
        let pruned = before.saturating_sub(self.families.len());
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired refresh families");
        }
        pruned
    }

    fn now(&self) -> i64 {
        self.clock.now().timestamp()
    }

    fn entry_for(&self, token_id: &str) -> FamilyEntry {
        FamilyEntry {
            token_id: token_id.to_string(),
            expires_at: self.now().saturating_add(self.ttl_seconds),
        }
    }

    fn after_write(&self) {
        let written = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if written % PRUNE_EVERY_WRITES == 0 {
            self.prune_expired();
        }
    }
}

#[async_trait]
impl RefreshStateStore for InMemoryRefreshStore {
    async fn get_current(&self, family_id: &str) -> Result<Option<String>, anyhow::Error> {
        let now = self.now();
        Ok(self
            .families
            .get(family_id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.token_id.clone()))
    }

    async fn set_current(&self, family_id: &str, token_id: &str) -> Result<(), anyhow::Error> {
        self.families
            .insert(family_id.to_string(), self.entry_for(token_id));
        self.after_write();
        Ok(())
    }

    async fn rotate(
        &self,
        family_id: &str,
        expected: &str,
        next: &str,
    ) -> Result<RotateOutcome, anyhow::Error> {
        let now = self.now();
        let outcome = match self.families.entry(family_id.to_string()) {
            Entry::Occupied(entry) if entry.get().expires_at <= now => {
                entry.remove();
                RotateOutcome::Missing
            }
            Entry::Occupied(mut entry) if entry.get().token_id == expected => {
                entry.insert(self.entry_for(next));
                RotateOutcome::Rotated
            }
            Entry::Occupied(entry) => {
                entry.remove();
                RotateOutcome::Superseded
            }
            Entry::Vacant(_) => RotateOutcome::Missing,
        };
        self.after_write();
        Ok(outcome)
    }

    async fn revoke(&self, family_id: &str) -> Result<(), anyhow::Error> {
        self.families.remove(family_id);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
