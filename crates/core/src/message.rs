//! Message and Conversation domain types.
//!
//! A conversation is a sequence of messages, each message a list of typed
//! content blocks. The block model mirrors the Messages API wire format so a
//! conversation serializes straight into a request body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user, and tool results fed back to the model
    User,
    /// The model
    Assistant,
}

/// Prompt-cache annotation attached to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheControl {
    Ephemeral,
}

/// One typed unit of message content.
///
/// Closed set: deserializing any other `type` tag is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    Thinking(ThinkingBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// Model reasoning, echoed back verbatim on later turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingBlock {
    pub thinking: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A request from the model to run a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

/// The answer to exactly one [`ToolUseBlock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    #[serde(default)]
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(TextBlock {
            text: text.into(),
            cache_control: None,
        })
    }

    pub fn cache_control(&self) -> Option<CacheControl> {
        match self {
            Self::Text(b) => b.cache_control,
            Self::ToolUse(b) => b.cache_control,
            Self::ToolResult(b) => b.cache_control,
            Self::Thinking(_) => None,
        }
    }

    /// Set or clear the cache annotation. Thinking blocks cannot carry one;
    /// returns whether the annotation was applied.
    pub fn set_cache_control(&mut self, value: Option<CacheControl>) -> bool {
        match self {
            Self::Text(b) => b.cache_control = value,
            Self::ToolUse(b) => b.cache_control = value,
            Self::ToolResult(b) => b.cache_control = value,
            Self::Thinking(_) => return false,
        }
        true
    }

    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            Self::ToolUse(b) => Some(b),
            _ => None,
        }
    }
}

impl ToolResultContent {
    pub fn png(data: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource::Base64 {
                media_type: "image/png".into(),
                data: data.into(),
            },
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// Ordered content blocks
    pub content: Vec<ContentBlock>,
}

impl Message {
    /// Create a user message holding a single text block.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::text(text)],
        }
    }

    /// Create a user message carrying tool results.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: results,
        }
    }

    /// Create an assistant message from parsed response blocks.
    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Tool-use blocks in this message, in order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUseBlock> {
        self.content.iter().filter_map(ContentBlock::as_tool_use)
    }

    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text(t) => Some(t.text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A conversation is an ordered sequence of messages with shared context.
///
/// Owned by the caller; the turn loop only appends to it (apart from the
/// transient cache annotations and historic image pruning).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of image payloads held in tool results.
    pub fn image_count(&self) -> usize {
        self.tool_result_contents().filter(|c| c.is_image()).count()
    }

    fn tool_result_contents(&self) -> impl Iterator<Item = &ToolResultContent> {
        self.messages
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolResult(r) => Some(r.content.iter()),
                _ => None,
            })
            .flatten()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello, agent!");
        assert_eq!(msg.tool_uses().count(), 0);
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn blocks_use_wire_shape() {
        let block = ContentBlock::ToolResult(ToolResultBlock {
            tool_use_id: "toolu_1".into(),
            content: vec![
                ToolResultContent::Text { text: "done".into() },
                ToolResultContent::png("aGVsbG8="),
            ],
            is_error: false,
            cache_control: Some(CacheControl::Ephemeral),
        });
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": [
                    {"type": "text", "text": "done"},
                    {"type": "image", "source": {"type": "base64", "media_type": "image/png", "data": "aGVsbG8="}}
                ],
                "is_error": false,
                "cache_control": {"type": "ephemeral"}
            })
        );
    }

    #[test]
    fn text_block_omits_absent_cache_control() {
        let value = serde_json::to_value(ContentBlock::text("hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn unknown_block_tag_is_rejected() {
        let result: Result<ContentBlock, _> =
            serde_json::from_value(json!({"type": "hologram", "data": "?"}));
        assert!(result.is_err());
    }

    #[test]
    fn parses_thinking_and_tool_use() {
        let blocks: Vec<ContentBlock> = serde_json::from_value(json!([
            {"type": "thinking", "thinking": "Look first.", "signature": "sig"},
            {"type": "tool_use", "id": "toolu_9", "name": "computer", "input": {"action": "screenshot"}}
        ]))
        .unwrap();
        let msg = Message::assistant(blocks);
        let uses: Vec<_> = msg.tool_uses().collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].name, "computer");
        assert!(matches!(
            &msg.content[0],
            ContentBlock::Thinking(ThinkingBlock { signature: Some(s), .. }) if s == "sig"
        ));
    }

    #[test]
    fn thinking_rejects_cache_control() {
        let mut block = ContentBlock::Thinking(ThinkingBlock {
            thinking: "hmm".into(),
            signature: None,
        });
        assert!(!block.set_cache_control(Some(CacheControl::Ephemeral)));
        assert_eq!(block.cache_control(), None);
    }

    #[test]
    fn image_count_spans_all_tool_results() {
        let mut conv = Conversation::new();
        for i in 0..3 {
            conv.push(Message::tool_results(vec![ContentBlock::ToolResult(
                ToolResultBlock {
                    tool_use_id: format!("toolu_{i}"),
                    content: vec![ToolResultContent::png("AAAA")],
                    is_error: false,
                    cache_control: None,
                },
            )]));
        }
        assert_eq!(conv.image_count(), 3);
    }
}
