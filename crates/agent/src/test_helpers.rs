//! Shared test helpers for turn loop tests.

use deskpilot_core::error::ProviderError;
use deskpilot_core::message::{ContentBlock, ToolUseBlock};
use deskpilot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// A provider that replays scripted responses and records each request.
///
/// Panics if called more often than it has responses.
pub struct ScriptedProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose first call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            responses: Mutex::new(vec![Err(error)]),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let call = requests.len();
        requests.push(request);

        let responses = self.responses.lock().unwrap();
        match responses.get(call) {
            Some(response) => response.clone(),
            None => panic!(
                "ScriptedProvider: no more responses (call #{call}, have {})",
                responses.len()
            ),
        }
    }
}

fn response(content: Vec<ContentBlock>, stop_reason: &str) -> ProviderResponse {
    ProviderResponse {
        id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
        content,
        model: "scripted-model".into(),
        stop_reason: Some(stop_reason.into()),
        usage: Some(Usage {
            input_tokens: 10,
            output_tokens: 5,
            ..Usage::default()
        }),
    }
}

/// A reply with a single text block.
pub fn text_response(text: &str) -> ProviderResponse {
    response(vec![ContentBlock::text(text)], "end_turn")
}

/// A reply requesting the given `(id, tool, input)` calls, in order.
pub fn tool_use_response(calls: Vec<(&str, &str, serde_json::Value)>) -> ProviderResponse {
    let content = calls
        .into_iter()
        .map(|(id, name, input)| {
            ContentBlock::ToolUse(ToolUseBlock {
                id: id.into(),
                name: name.into(),
                input,
                cache_control: None,
            })
        })
        .collect();
    response(content, "tool_use")
}
