//! In-memory storage for tests and embedding.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::ports::{LockLease, StorageError, StorageProvider, StorageResult};

/// Thread-safe in-memory implementation of [`StorageProvider`].
///
/// Entries live in an ordered map so prefix scans behave like the shared
/// stores this crate targets. Lease expiry is evaluated against an injected
/// clock so tests can step time.
pub struct InMemoryStorage<C = DefaultClock>
where
    C: Clock + Send + Sync,
{
    state: Arc<RwLock<MemoryState>>,
    clock: Arc<C>,
}

impl<C> Clone for InMemoryStorage<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, String>,
    leases: HashMap<String, LeaseRecord>,
}

#[derive(Debug)]
struct LeaseRecord {
    holder: String,
    token: Uuid,
    expires_at: DateTime<Utc>,
}

impl InMemoryStorage<DefaultClock> {
    /// Creates an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryStorage<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryStorage<C>
where
    C: Clock + Send + Sync,
{
    /// Creates an empty store evaluating lease expiry against `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            clock,
        }
    }

    /// Removes the value at `key`, if any. Test helper for simulating
    /// partial writes.
    pub fn remove(&self, key: &str) -> StorageResult<()> {
        let mut state = write_state(&self.state)?;
        state.entries.remove(key);
        Ok(())
    }
}

#[async_trait]
impl<C> StorageProvider for InMemoryStorage<C>
where
    C: Clock + Send + Sync,
{
    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut state = write_state(&self.state)?;
        state.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get(&self, key: &str, is_prefix: bool) -> StorageResult<Vec<String>> {
        let state = read_state(&self.state)?;
        if is_prefix {
            Ok(state
                .entries
                .range(key.to_owned()..)
                .take_while(|(stored, _)| stored.starts_with(key))
                .map(|(_, value)| value.clone())
                .collect())
        } else {
            Ok(state.entries.get(key).cloned().into_iter().collect())
        }
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let state = read_state(&self.state)?;
        Ok(state
            .entries
            .range(prefix.to_owned()..)
            .take_while(|(stored, _)| stored.starts_with(prefix))
            .map(|(stored, _)| stored.clone())
            .collect())
    }

    async fn lock(&self, key: &str, holder: &str, ttl: TimeDelta) -> StorageResult<LockLease> {
        let now = self.clock.utc();
        let mut state = write_state(&self.state)?;
        if let Some(record) = state.leases.get(key) {
            if record.expires_at > now && record.holder != holder {
                return Err(StorageError::LockConflict {
                    key: key.to_owned(),
                    holder: record.holder.clone(),
                });
            }
        }

        let token = Uuid::new_v4();
        let expires_at = now + ttl;
        state.leases.insert(
            key.to_owned(),
            LeaseRecord {
                holder: holder.to_owned(),
                token,
                expires_at,
            },
        );
        Ok(LockLease::new(key, holder, token, expires_at))
    }

    async fn unlock(&self, key: &str, lease: &LockLease) -> StorageResult<()> {
        let mut state = write_state(&self.state)?;
        let still_held = state
            .leases
            .get(key)
            .is_some_and(|record| record.token == lease.token());
        if !still_held {
            return Err(StorageError::StaleLease {
                key: key.to_owned(),
            });
        }
        state.leases.remove(key);
        Ok(())
    }
}

fn read_state(
    state: &Arc<RwLock<MemoryState>>,
) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>, StorageError> {
    state
        .read()
        .map_err(|err| StorageError::backend(std::io::Error::other(err.to_string())))
}

fn write_state(
    state: &Arc<RwLock<MemoryState>>,
) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>, StorageError> {
    state
        .write()
        .map_err(|err| StorageError::backend(std::io::Error::other(err.to_string())))
}
