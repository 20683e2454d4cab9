//! SQLite-backed, generation-scoped response cache.
//!
//! Each generation is a named store inside one database:
//!
//! - Entries keyed by canonical request identity (SHA-256 of method + URL)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Deleting a generation cascades to its entries

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedEntry;
pub use generations::GenerationId;
pub use store::{CacheStorage, StoreHandle};
