//! The deskpilot turn loop.
//!
//! One run follows a **Call → Act → Observe** cycle:
//!
//! 1. **Prepare context**: mark prompt-cache breakpoints or prune old screenshots
//! 2. **Call the model** with the conversation, system prompt and tool schema
//! 3. **Act**: run each requested tool in order
//! 4. **Observe**: append the results as one user message and loop back to step 1
//!
//! The run ends when the model replies without requesting a tool, or when a
//! model call fails.

pub mod context;
pub mod dispatcher;
pub mod loop_runner;
pub mod prompt;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{CacheBreakpointInjector, ImageRetentionPolicy, MAX_CACHE_BREAKPOINTS};
pub use dispatcher::ToolDispatcher;
pub use loop_runner::{LoopSettings, TurnLoop, TurnOutcome};
pub use prompt::SystemPrompt;
pub use stream_event::{EventSink, LoopEvent, RunStatus, events};
