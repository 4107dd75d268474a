//! Storage port: ordered key/value access with a lease lock primitive.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Ordered key/value persistence contract.
///
/// The manager makes no assumption about transactionality across keys: all
/// of its multi-key writes are idempotent on retry and tolerate partial
/// application. Implementations only need per-key atomicity.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Unconditionally writes `value` at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] when the write fails.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Reads values by exact key or by key prefix.
    ///
    /// With `is_prefix` false, returns the value stored at `key` or an
    /// empty result when the key is absent. With `is_prefix` true, returns
    /// the values of every key with the given string prefix, in no
    /// particular order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] when the read fails.
    async fn get(&self, key: &str, is_prefix: bool) -> StorageResult<Vec<String>>;

    /// Lists the keys with the given string prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] when the scan fails.
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Acquires a lease on `key` for `holder`.
    ///
    /// Succeeds when no unexpired lease exists, when the existing lease has
    /// expired (reclaim), or when the existing lease is held by the same
    /// holder (refresh, which re-arms the TTL and invalidates the previous
    /// lease handle).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::LockConflict`] when another holder owns an
    /// unexpired lease, or [`StorageError::Backend`] on backend failure.
    async fn lock(&self, key: &str, holder: &str, ttl: TimeDelta) -> StorageResult<LockLease>;

    /// Releases the lease on `key`.
    ///
    /// Fenced: the release only applies when `lease` still matches the
    /// stored lease.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StaleLease`] when the stored lease does not
    /// match, or [`StorageError::Backend`] on backend failure.
    async fn unlock(&self, key: &str, lease: &LockLease) -> StorageResult<()>;
}

/// Opaque handle for a held lease.
///
/// The fence token distinguishes a lease from any later lease on the same
/// key, including one re-acquired by the same holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    key: String,
    holder: String,
    token: Uuid,
    expires_at: DateTime<Utc>,
}

impl LockLease {
    /// Creates a lease handle. Intended for [`StorageProvider`]
    /// implementations.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        holder: impl Into<String>,
        token: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            holder: holder.into(),
            token,
            expires_at,
        }
    }

    /// Returns the locked key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the holder identifier.
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Returns the fence token.
    #[must_use]
    pub const fn token(&self) -> Uuid {
        self.token
    }

    /// Returns the instant the lease lapses unless refreshed.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Errors returned by storage implementations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The backend failed to serve the operation.
    #[error("storage backend failure: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),

    /// An unexpired lease on the key is held by another holder.
    #[error("lock on '{key}' is held by '{holder}'")]
    LockConflict {
        /// Contended key.
        key: String,
        /// Holder owning the current lease.
        holder: String,
    },

    /// The supplied lease no longer matches the stored one.
    #[error("lease for '{key}' is stale")]
    StaleLease {
        /// Key the lease referred to.
        key: String,
    },
}

impl StorageError {
    /// Wraps a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
