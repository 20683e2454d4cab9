//! Client code for shelter.
//!
//! This crate provides the network side of the proxy: an HTTP fetch
//! client implementing [`shelter_core::Network`] and URL resolution
//! against the application origin.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, canonicalize, resolve};
