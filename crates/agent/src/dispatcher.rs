//! Tool dispatch for `tool_use` blocks.

use deskpilot_core::message::ToolUseBlock;
use deskpilot_core::provider::ToolDefinition;
use deskpilot_core::tool::{ToolRegistry, ToolResult};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes tool calls to the registry. Never fails: unknown tools, bad
/// arguments and execution errors all come back as error results so the
/// model can see them and recover.
#[derive(Clone)]
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    pub async fn dispatch(&self, call: &ToolUseBlock) -> ToolResult {
        let start = std::time::Instant::now();
        let result = self.tools.execute(&call.name, call.input.clone()).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                debug!(tool = %call.name, id = %call.id, duration_ms, "Tool call finished");
                result
            }
            Err(e) => {
                warn!(tool = %call.name, id = %call.id, error = %e, "Tool call failed");
                ToolResult::from(e)
            }
        }
    }
}
