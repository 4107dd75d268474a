//! Taskledger: durable bookkeeping for tasks and task runs.
//!
//! This crate records the existence of long-running work items ("tasks"),
//! generates ordered runs of each task, tracks each run's lifecycle
//! (pending, running, terminal), and serves historical queries by
//! identifier or by date. An external executor consults it to decide what
//! to do next and to publish progress; the crate itself contains no
//! scheduling policy and no background loops.
//!
//! # Architecture
//!
//! Taskledger follows hexagonal architecture principles:
//!
//! - **Domain**: Pure task/run types with no infrastructure dependencies
//! - **Ports**: The [`ports::StorageProvider`] contract the manager consumes
//! - **Adapters**: Concrete implementations of ports (in-memory ordered store)
//! - **Services**: The [`services::TaskManager`] orchestration surface
//!
//! # Modules
//!
//! - [`domain`]: Task and run metadata, statuses, triggers, and targets
//! - [`codec`]: Wire encoding with polymorphic variant registries
//! - [`keys`]: The persisted key layout over the ordered store
//! - [`ports`]: Storage contract and lease lock primitive
//! - [`adapters`]: In-memory storage for tests and embedding
//! - [`services`]: Task manager operations and request context

pub mod adapters;
pub mod codec;
pub mod domain;
pub mod keys;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
