//! Platform REST plumbing: a shared client plus config-driven adapters.

mod adapter;
mod client;
mod scopes;

pub use adapter::HttpKindAdapter;
pub use client::{ClientError, PlatformClient, RetryConfig};
pub use scopes::{HttpScopeProvider, NoScopeSource};
