//! Forcebridge: asynchronous org operations for Salesforce development.
//!
//! The crate bridges blocking org calls into a host that must never block:
//! [`bridge::dispatch`] runs one async call on its own worker thread and
//! [`bridge::Poller`] delivers the outcome to a completion action exactly
//! once. Everything above that is Salesforce plumbing: a REST client,
//! describe/query/test operations, metadata retrieves, and the persisted
//! per-org stores that back editor completions.

pub mod api;
pub mod bridge;
pub mod bundle;
pub mod cache;
pub mod completions;
pub mod format;
pub mod messages;
pub mod operation_log;
pub mod operations;
pub mod report;
pub mod rest;
pub mod session;
pub mod shell;
pub mod stores;

#[cfg(test)]
mod testing;

pub use api::{RemoteResponse, RemoteService};
pub use bridge::{dispatch, PendingOperation, PollState, Poller};
pub use session::SessionConfig;
