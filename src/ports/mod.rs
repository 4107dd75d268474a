//! Port contracts the manager consumes.

mod storage;

pub use storage::{LockLease, StorageError, StorageProvider, StorageResult};
