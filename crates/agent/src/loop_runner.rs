//! The turn loop implementation.

use std::sync::Arc;
use deskpilot_config::AppConfig;
use deskpilot_core::error::ProviderError;
use deskpilot_core::message::{ContentBlock, Conversation, Message};
use deskpilot_core::provider::{Provider, ProviderRequest};
use deskpilot_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::context::{CacheBreakpointInjector, ImageRetentionPolicy, MAX_CACHE_BREAKPOINTS};
use crate::dispatcher::ToolDispatcher;
use crate::prompt::SystemPrompt;
use crate::stream_event::{EventSink, LoopEvent, RunStatus};

pub const COMPUTER_USE_BETA: &str = "computer-use-2025-01-24";
pub const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";
pub const TOKEN_EFFICIENT_TOOLS_BETA: &str = "token-efficient-tools-2025-02-19";

/// Per-run model settings.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub max_tokens: u32,
    pub thinking_budget: Option<u32>,
    /// Screenshots kept in history; 0 keeps all of them
    pub only_n_most_recent_images: usize,
    pub prompt_caching: bool,
    pub token_efficient_tools: bool,
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            thinking_budget: config.thinking_budget,
            only_n_most_recent_images: config.only_n_most_recent_images,
            prompt_caching: config.prompt_caching,
            token_efficient_tools: config.token_efficient_tools,
        }
    }

    pub fn betas(&self) -> Vec<String> {
        let mut betas = vec![COMPUTER_USE_BETA.to_string()];
        if self.prompt_caching {
            betas.push(PROMPT_CACHING_BETA.to_string());
        }
        if self.token_efficient_tools {
            betas.push(TOKEN_EFFICIENT_TOOLS_BETA.to_string());
        }
        betas
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// How a call to [`TurnLoop::run`] ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The model answered without requesting any tool.
    Completed { iterations: u32 },

    /// A model call failed after the provider gave up retrying. The
    /// conversation keeps everything appended before the failure.
    ProviderFailed { error: ProviderError, iterations: u32 },
}

impl TurnOutcome {
    pub fn iterations(&self) -> u32 {
        match self {
            Self::Completed { iterations } | Self::ProviderFailed { iterations, .. } => *iterations,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            Self::Completed { .. } => RunStatus::Completed,
            Self::ProviderFailed { .. } => RunStatus::ProviderFailed,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn into_result(self) -> Result<u32, ProviderError> {
        match self {
            Self::Completed { iterations } => Ok(iterations),
            Self::ProviderFailed { error, .. } => Err(error),
        }
    }
}

/// Drives the model ↔ tool exchange for one user request.
///
/// Each iteration applies the context policies, calls the model, appends its
/// reply, runs every requested tool in order and appends their results as
/// one user message. The loop ends when a reply requests no tools.
pub struct TurnLoop {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    settings: LoopSettings,
    system_prompt: SystemPrompt,
    events: EventSink,
}

impl TurnLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, settings: LoopSettings) -> Self {
        Self {
            provider,
            dispatcher: ToolDispatcher::new(tools),
            settings,
            system_prompt: SystemPrompt::default(),
            events: EventSink::disabled(),
        }
    }

    /// Build a loop from configuration, with the configured provider stack.
    pub fn from_config(config: &AppConfig, tools: Arc<ToolRegistry>) -> Result<Self, ProviderError> {
        let provider = deskpilot_providers::build_provider(config)?;
        Ok(Self::new(provider, tools, LoopSettings::from_config(config))
            .with_system_prompt(SystemPrompt::new(config.system_prompt_suffix.clone())))
    }

    pub fn with_system_prompt(mut self, prompt: SystemPrompt) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Report progress to `sink`.
    pub fn with_events(mut self, sink: EventSink) -> Self {
        self.events = sink;
        self
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run until the model stops requesting tools or a model call fails.
    ///
    /// Dropping the returned future cancels the run; the conversation keeps
    /// whatever was appended up to that point.
    pub async fn run(&self, conversation: &mut Conversation) -> TurnOutcome {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            model = %self.settings.model,
            "Starting turn loop"
        );

        let tools = self.dispatcher.definitions();
        let system = self.system_prompt.blocks(self.settings.prompt_caching);
        let betas = self.settings.betas();
        let mut iterations = 0;

        loop {
            iterations += 1;
            debug!(conversation_id = %conversation.id, iteration = iterations, "Turn loop iteration");

            let mut keep_images = self.settings.only_n_most_recent_images;
            if self.settings.prompt_caching {
                CacheBreakpointInjector::apply(conversation, MAX_CACHE_BREAKPOINTS);
                keep_images = 0;
            }
            if keep_images > 0 {
                ImageRetentionPolicy::apply(conversation, keep_images, keep_images);
            }

            let request = ProviderRequest {
                model: self.settings.model.clone(),
                messages: conversation.messages.clone(),
                system: system.clone(),
                tools: tools.clone(),
                max_tokens: self.settings.max_tokens,
                thinking_budget: self.settings.thinking_budget,
                betas: betas.clone(),
            };

            let response = match self.provider.complete(request).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(
                        conversation_id = %conversation.id,
                        iteration = iterations,
                        error = %error,
                        "Model call failed, ending run"
                    );
                    self.events
                        .emit(LoopEvent::ProviderFailure {
                            model: self.settings.model.clone(),
                            message_count: conversation.len(),
                            kind: error.kind(),
                            error: error.to_string(),
                        })
                        .await;
                    self.finish(RunStatus::ProviderFailed, iterations).await;
                    return TurnOutcome::ProviderFailed { error, iterations };
                }
            };

            self.events
                .emit(LoopEvent::ApiExchange {
                    request_id: response.id.clone(),
                    model: response.model.clone(),
                    stop_reason: response.stop_reason.clone(),
                    usage: response.usage.clone(),
                })
                .await;

            conversation.push(Message::assistant(response.content.clone()));

            let mut results = Vec::new();
            for block in response.content {
                let call = match &block {
                    ContentBlock::ToolUse(call) => Some(call.clone()),
                    _ => None,
                };
                self.events.emit(LoopEvent::Content { block }).await;

                if let Some(call) = call {
                    let result = self.dispatcher.dispatch(&call).await;
                    self.events
                        .emit(LoopEvent::ToolOutput {
                            tool_use_id: call.id.clone(),
                            result: result.clone(),
                        })
                        .await;
                    results.push(result.into_block(call.id));
                }
            }

            if results.is_empty() {
                info!(conversation_id = %conversation.id, iterations, "Turn loop completed");
                self.finish(RunStatus::Completed, iterations).await;
                return TurnOutcome::Completed { iterations };
            }

            debug!(tool_results = results.len(), "Appending tool results");
            conversation.push(Message::tool_results(results));
        }
    }

    async fn finish(&self, outcome: RunStatus, iterations: u32) {
        self.events.emit(LoopEvent::Finished { outcome, iterations }).await;
    }
}
