//! Loop events.
//!
//! `LoopEvent`s report what the turn loop is doing: every content block the
//! model produced, every tool result, each API exchange and how the run
//! ended. They travel over a bounded channel; the loop awaits each send, so
//! a slow consumer slows the loop down instead of losing events.

use deskpilot_core::error::ProviderErrorKind;
use deskpilot_core::message::ContentBlock;
use deskpilot_core::provider::Usage;
use deskpilot_core::tool::ToolResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    ProviderFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// A block from the model's response, in response order.
    Content { block: ContentBlock },

    /// A tool call finished.
    ToolOutput {
        tool_use_id: String,
        result: ToolResult,
    },

    /// A model call succeeded.
    ApiExchange {
        request_id: String,
        model: String,
        stop_reason: Option<String>,
        usage: Option<Usage>,
    },

    /// A model call failed for good; the run is over.
    ProviderFailure {
        model: String,
        message_count: usize,
        kind: ProviderErrorKind,
        error: String,
    },

    Finished { outcome: RunStatus, iterations: u32 },
}

impl LoopEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Content { .. } => "content",
            Self::ToolOutput { .. } => "tool_output",
            Self::ApiExchange { .. } => "api_exchange",
            Self::ProviderFailure { .. } => "provider_failure",
            Self::Finished { .. } => "finished",
        }
    }
}

/// Sending half held by the turn loop.
///
/// A sink without a channel discards everything. Once the receiver is gone
/// events are discarded too.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<LoopEvent>>,
    closed: Arc<AtomicBool>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<LoopEvent>) -> Self {
        Self {
            tx: Some(tx),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn emit(&self, event: LoopEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send(event).await.is_err() && !self.closed.swap(true, Ordering::Relaxed) {
            debug!("Loop event receiver dropped, discarding further events");
        }
    }
}

/// A bounded event channel.
pub fn events(capacity: usize) -> (EventSink, mpsc::Receiver<LoopEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink::new(tx), rx)
}
