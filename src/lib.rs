//! maintctl: puts a multi-tenant compute platform into maintenance mode.
//!
//! Active resources of every configured kind are captured to a snapshot,
//! driven to stopped by the batched [`engine`], and later restarted from the
//! same snapshot for kinds that support it.

pub mod adapter;
pub mod cli;
pub mod config;
pub mod engine;
pub mod enumerator;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod resource;
pub mod snapshot;
pub mod ui;

#[cfg(test)]
pub mod testing;
