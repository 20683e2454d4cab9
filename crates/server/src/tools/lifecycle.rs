//! lifecycle_install and lifecycle_status tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_core::GenerationId;

use crate::error::{ToolError, json_result};
use crate::state::ProxyState;

/// Parameters for the lifecycle_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LifecycleInstallParams {
    /// Identifier of the new generation.
    pub generation: String,
}

/// Parameters for the lifecycle_status tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct LifecycleStatusParams {}

/// Implementation of the lifecycle_install tool.
///
/// Seeds the generation, then leaves a background task waiting for idle
/// scopes or an adopt-now signal. A generation that is already waiting is
/// rejected, so each waiting generation has exactly one such task.
pub async fn install_impl(state: &ProxyState, params: LifecycleInstallParams) -> Result<CallToolResult, McpError> {
    let id = params.generation.trim();
    if id.is_empty() {
        return Err(ToolError::InvalidInput("generation cannot be empty".into()).into());
    }
    let generation = GenerationId::new(id);

    state.lifecycle.install(&generation).await?;

    let lifecycle = state.lifecycle.clone();
    tokio::spawn(async move {
        match lifecycle.activate_when_ready(&generation).await {
            Ok(true) => {}
            Ok(false) => tracing::info!(%generation, "generation replaced before activation"),
            Err(e) => tracing::error!(%generation, error = %e, "activation failed"),
        }
    });

    json_result(&state.lifecycle.status().await)
}

/// Implementation of the lifecycle_status tool.
pub async fn status_impl(state: &ProxyState, _params: LifecycleStatusParams) -> Result<CallToolResult, McpError> {
    json_result(&state.lifecycle.status().await)
}
