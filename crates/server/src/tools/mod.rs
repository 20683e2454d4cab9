//! MCP tool implementations.
//!
//! This module contains all tools exposed by the shelter server.

pub mod cache;
pub mod control;
pub mod lifecycle;
pub mod proxy_fetch;

pub use control::ControlPostParams;
pub use lifecycle::{LifecycleInstallParams, LifecycleStatusParams};
pub use proxy_fetch::ProxyFetchParams;
