//! Cache-related MCP tools.
//!
//! This module provides read-only access to the active generation's store.

pub mod get;

pub use get::{CacheGetParams, get_impl};
