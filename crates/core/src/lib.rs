//! Core types and shared functionality for shelter.
//!
//! This crate provides:
//! - Generation-scoped response cache with SQLite backend
//! - Request routing and the caching strategies
//! - Cache generation lifecycle (install, activate, purge) and control signals
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod worker;

pub use cache::{CacheDb, CacheStorage, CachedEntry, GenerationId, StoreHandle};
pub use error::Error;
pub use http::{Network, Request, Response};
pub use worker::CacheWorker;

#[cfg(test)]
pub(crate) mod testing;
