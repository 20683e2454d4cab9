//! cache_get tool implementation.
//!
//! Looks a URL up in the active generation without touching the network.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_client::resolve;
use shelter_core::{GenerationId, Request};

use crate::error::{ToolError, json_result};
use crate::state::ProxyState;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Path or absolute URL to look up.
    pub url: String,
}

/// A stored entry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachedEntryView {
    pub generation: GenerationId,
    pub key: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub stored_at: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// The resolved URL.
    pub url: String,
    /// The entry, if the active generation holds one.
    pub entry: Option<CachedEntryView>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &ProxyState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&state.origin, &params.url).map_err(ToolError::from)?;
    let request = Request::get(url);

    let entry = state
        .worker
        .lookup(&request)
        .await?
        .map(|(generation, entry)| CachedEntryView {
            generation,
            key: entry.key,
            status: entry.response.status,
            body: String::from_utf8_lossy(&entry.response.body).into_owned(),
            headers: entry.response.headers,
            stored_at: entry.stored_at,
        });

    json_result(&CacheGetOutput { url: request.url.to_string(), entry })
}
