//! # deskpilot core
//!
//! Domain types, traits, and error definitions for the deskpilot
//! screen-control agent. Every other crate depends inward on this one.
//!
//! The model backend and tools are traits here; implementations live in
//! `deskpilot-providers` and `deskpilot-tools`, which keeps the turn loop
//! testable with scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, ProviderErrorKind, Result, ToolError};
pub use message::{
    CacheControl, ContentBlock, Conversation, ConversationId, ImageSource, Message, Role,
    TextBlock, ThinkingBlock, ToolResultBlock, ToolResultContent, ToolUseBlock,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolRegistry, ToolResult};
