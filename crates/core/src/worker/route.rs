//! Request path classification.

use serde::{Deserialize, Serialize};

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    CacheFirst,
    NetworkFirst,
    NetworkOnly,
}

/// Classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    /// Immutable-by-URL assets.
    Media,
    /// Data that changes and should be fresh when possible.
    Api,
    /// Documents and everything else.
    Other,
}

/// Prefix table, first match wins.
const ROUTES: &[(&str, RouteClass)] = &[("/media/", RouteClass::Media), ("/api/", RouteClass::Api)];

impl RouteClass {
    pub fn strategy(self) -> Strategy {
        match self {
            RouteClass::Media => Strategy::CacheFirst,
            RouteClass::Api => Strategy::NetworkFirst,
            RouteClass::Other => Strategy::NetworkOnly,
        }
    }
}

/// Classify a URL path.
pub fn classify(path: &str) -> RouteClass {
    ROUTES
        .iter()
        .find(|(prefix, _)| path.starts_with(prefix))
        .map(|(_, class)| *class)
        .unwrap_or(RouteClass::Other)
}

/// Strategy for a URL path.
pub fn select(path: &str) -> Strategy {
    classify(path).strategy()
}
