//! control_post tool implementation.
//!
//! Posts a fire-and-forget control message to the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_core::worker::ControlSignal;

use crate::error::{ToolError, json_result};
use crate::state::ProxyState;

/// Parameters for the control_post tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlPostParams {
    /// Signal kind, e.g. "adopt-now". Unknown kinds are accepted and ignored.
    pub kind: String,
}

/// Output from the control_post tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlPostOutput {
    /// The kind as posted.
    pub kind: String,
    /// Whether this build recognizes the kind.
    pub recognized: bool,
}

/// Implementation of the control_post tool.
pub async fn post_impl(state: &ProxyState, params: ControlPostParams) -> Result<CallToolResult, McpError> {
    let signal: ControlSignal =
        serde_json::from_value(serde_json::json!({ "kind": params.kind })).map_err(ToolError::from)?;
    let recognized = signal != ControlSignal::Unknown;

    state.control.post(signal);

    json_result(&ControlPostOutput { kind: params.kind, recognized })
}
