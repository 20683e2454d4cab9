//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::ProxyState;
use crate::tools::cache::{CacheGetParams, get_impl};
use crate::tools::control::{ControlPostParams, post_impl};
use crate::tools::lifecycle::{LifecycleInstallParams, LifecycleStatusParams, install_impl, status_impl};
use crate::tools::proxy_fetch::{ProxyFetchParams, fetch_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shelter_core::worker::Scope;

/// The main MCP server handler for shelter.
///
/// One handler serves one client session, which is held open as a single
/// request scope for as long as the handler lives.
#[derive(Clone)]
pub struct ShelterServer {
    tool_router: ToolRouter<Self>,
    state: Arc<ProxyState>,
    _session: Arc<Scope>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShelterServer {
    /// Create a new server handler.
    pub fn new(state: Arc<ProxyState>, session: Scope) -> Self {
        Self { tool_router: Self::tool_router(), state, _session: Arc::new(session) }
    }

    /// Fetch a URL through the offline cache.
    #[tool(
        description = "Fetch a path or URL through the offline cache. /media/ is cache-first, /api/ is network-first with cached fallback, everything else is network-only."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state, params.0).await
    }

    /// Post a control message.
    #[tool(description = "Post a control message. kind \"adopt-now\" promotes a waiting cache generation immediately.")]
    async fn control_post(&self, params: Parameters<ControlPostParams>) -> Result<CallToolResult, McpError> {
        post_impl(&self.state, params.0).await
    }

    /// Install a new cache generation.
    #[tool(
        description = "Install and seed a new cache generation. It activates once no session uses the old one, or on adopt-now."
    )]
    async fn lifecycle_install(&self, params: Parameters<LifecycleInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.state, params.0).await
    }

    /// Report generation phases.
    #[tool(description = "Show the active and waiting cache generations and the phase of each known generation.")]
    async fn lifecycle_status(&self, params: Parameters<LifecycleStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.state, params.0).await
    }

    /// Look up a cached entry.
    #[tool(description = "Look up a path or URL in the active cache generation without using the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.state, params.0).await
    }
}

impl ServerHandler for ShelterServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shelter".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::offline_state;

    #[tokio::test]
    async fn test_lists_every_tool() {
        let (_, state) = offline_state().await;
        let session = state.scopes.open(None);
        let server = ShelterServer::new(Arc::new(state), session);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cache_get", "control_post", "lifecycle_install", "lifecycle_status", "proxy_fetch"]);
    }
}
