//! Canonical request identity used as the store key.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the store key for a request URL.
///
/// The method is always `GET` for caching purposes and the fragment never
/// reaches the network, so neither distinguishes two keys.
pub fn compute_request_key(url: &Url) -> String {
    let mut canonical = url.clone();
    canonical.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(b"GET");
    hasher.update(b"\n");
    hasher.update(canonical.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
