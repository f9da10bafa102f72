//! Computer tool: screen, mouse and keyboard control.
//!
//! Validates the model's `computer` input, scales logical coordinates onto
//! the real display, drives the [`Actuator`], and returns a result that
//! usually carries a fresh screenshot taken after a short settle delay.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use deskpilot_config::ComputerConfig;
use deskpilot_core::error::ToolError;
use deskpilot_core::tool::{Tool, ToolResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::action::{ACTIONS, ComputerAction};
use crate::actuator::{Actuator, MouseButton, Point, Resolution};
use crate::scaling::ScalingContext;

const DRAG_DURATION: Duration = Duration::from_millis(500);

/// Runtime knobs for [`ComputerTool`].
#[derive(Debug, Clone)]
pub struct ComputerOptions {
    /// Pause between an action and its screenshot
    pub screenshot_delay: Duration,
    /// Characters per `type_text` call
    pub typing_group_size: usize,
    /// Assumed display size when the actuator cannot report one
    pub fallback_resolution: Resolution,
}

impl Default for ComputerOptions {
    fn default() -> Self {
        Self::from(&ComputerConfig::default())
    }
}

impl From<&ComputerConfig> for ComputerOptions {
    fn from(config: &ComputerConfig) -> Self {
        Self {
            screenshot_delay: Duration::from_millis(config.screenshot_delay_ms),
            typing_group_size: config.typing_group_size.max(1),
            fallback_resolution: Resolution::new(config.fallback_width, config.fallback_height),
        }
    }
}

/// The `computer` tool.
pub struct ComputerTool {
    actuator: Arc<dyn Actuator>,
    scaling: ScalingContext,
    options: ComputerOptions,
}

impl ComputerTool {
    /// Build against a known physical resolution.
    pub fn new(actuator: Arc<dyn Actuator>, physical: Resolution, options: ComputerOptions) -> Self {
        Self {
            actuator,
            scaling: ScalingContext::new(physical),
            options,
        }
    }

    /// Ask the actuator for its screen size, falling back to the configured
    /// resolution when it cannot answer.
    pub async fn detect(actuator: Arc<dyn Actuator>, options: ComputerOptions) -> Self {
        let physical = match actuator.screen_size().await {
            Ok(size) if size.width > 0 && size.height > 0 => size,
            Ok(size) => {
                warn!(?size, "Actuator reported an empty screen, using fallback resolution");
                options.fallback_resolution
            }
            Err(e) => {
                warn!(error = %e, "Screen size unavailable, using fallback resolution");
                options.fallback_resolution
            }
        };
        debug!(width = physical.width, height = physical.height, "Computer tool ready");
        Self::new(actuator, physical, options)
    }

    pub fn scaling(&self) -> &ScalingContext {
        &self.scaling
    }

    async fn capture(&self) -> Result<String, ToolError> {
        let png = self.actuator.screenshot().await?;
        Ok(STANDARD.encode(png))
    }

    /// Wait for the screen to settle, then attach a screenshot. A failed
    /// capture degrades to a text-only result.
    async fn settled(&self, output: String) -> Result<ToolResult, ToolError> {
        tokio::time::sleep(self.options.screenshot_delay).await;
        Ok(self.with_screenshot(output).await)
    }

    async fn with_screenshot(&self, output: String) -> ToolResult {
        match self.capture().await {
            Ok(image) => ToolResult::output(output).with_image(image),
            Err(e) => {
                warn!(error = %e, "Screenshot after action failed, returning text only");
                ToolResult::output(output)
            }
        }
    }

    async fn move_to(&self, logical: Point) -> Result<(), ToolError> {
        let physical = self.scaling.to_physical(logical)?;
        self.actuator.move_cursor(physical).await?;
        Ok(())
    }

    /// Press `keys` in order. If one fails, the keys already down are
    /// released before the error is returned.
    async fn press_keys(&self, keys: &[String]) -> Result<(), ToolError> {
        for (pressed, key) in keys.iter().enumerate() {
            if let Err(e) = self.actuator.key_down(key).await {
                let _ = self.release_keys(&keys[..pressed]).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Release `keys` in reverse order. Every key gets a `key_up` even when
    /// an earlier one fails; the first failure is returned.
    async fn release_keys(&self, keys: &[String]) -> Result<(), ToolError> {
        let mut first_error = None;
        for key in keys.iter().rev() {
            if let Err(e) = self.actuator.key_up(key).await {
                warn!(key = %key, error = %e, "Key release failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn perform(&self, action: ComputerAction) -> Result<ToolResult, ToolError> {
        let name = action.name();
        match action {
            ComputerAction::Key { keys } => {
                self.actuator.hotkey(&key_sequence(&keys)).await?;
                self.settled(format!("Key combination '{keys}' pressed")).await
            }
            ComputerAction::HoldKey { keys, seconds } => {
                let sequence = key_sequence(&keys);
                self.press_keys(&sequence).await?;
                tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                self.release_keys(&sequence).await?;
                self.settled(format!("Held '{keys}' for {seconds}s")).await
            }
            ComputerAction::Type { text } => {
                let chars: Vec<char> = text.chars().collect();
                for chunk in chars.chunks(self.options.typing_group_size) {
                    let chunk: String = chunk.iter().collect();
                    self.actuator.type_text(&chunk).await?;
                }
                self.settled(format!("Typed {} characters", chars.len())).await
            }
            ComputerAction::CursorPosition => {
                let physical = self.actuator.cursor_position().await?;
                let logical = self.scaling.to_logical(physical);
                Ok(ToolResult::output(format!("X={},Y={}", logical.x, logical.y)))
            }
            ComputerAction::MouseMove { to } => {
                self.move_to(to).await?;
                self.settled(format!("Mouse moved to {to}")).await
            }
            ComputerAction::LeftMouseDown => {
                self.actuator.mouse_down(MouseButton::Left).await?;
                self.settled("Left mouse button pressed".into()).await
            }
            ComputerAction::LeftMouseUp => {
                self.actuator.mouse_up(MouseButton::Left).await?;
                self.settled("Left mouse button released".into()).await
            }
            ComputerAction::Click { button, count, at } => {
                if let Some(at) = at {
                    self.move_to(at).await?;
                }
                self.actuator.click(button, count).await?;
                self.settled(format!("{name} performed")).await
            }
            ComputerAction::LeftClickDrag { from, to } => {
                let target = self.scaling.to_physical(to)?;
                let origin = from.map(|p| self.scaling.to_physical(p)).transpose()?;
                if let Some(origin) = origin {
                    self.actuator.move_cursor(origin).await?;
                }
                let start = self.scaling.to_logical(self.actuator.cursor_position().await?);
                self.actuator.drag_to(target, MouseButton::Left, DRAG_DURATION).await?;
                self.settled(format!("Mouse dragged from {start} to {to}")).await
            }
            ComputerAction::Scroll { direction, amount, at, modifier } => {
                if let Some(at) = at {
                    self.move_to(at).await?;
                }
                let held = modifier.as_deref().map(key_sequence).unwrap_or_default();
                self.press_keys(&held).await?;
                let scrolled = self.actuator.scroll(direction, amount).await;
                let released = self.release_keys(&held).await;
                scrolled?;
                released?;
                self.settled(format!("Scrolled {direction} by {amount}")).await
            }
            ComputerAction::Wait { seconds } => {
                tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
                Ok(self.with_screenshot(format!("Waited {seconds}s")).await)
            }
            ComputerAction::Screenshot => {
                let image = self.capture().await?;
                Ok(ToolResult::output("Screenshot taken").with_image(image))
            }
            ComputerAction::RunCommand { command } => {
                let out = self.actuator.run_command(&command).await?;
                let stdout = out.stdout.trim_end();
                let stderr = out.stderr.trim_end();
                let text = match (stdout.is_empty(), stderr.is_empty()) {
                    (true, true) => format!("Command '{command}' run"),
                    (false, true) => stdout.to_string(),
                    (true, false) => format!("[stderr]: {stderr}"),
                    (false, false) => format!("{stdout}\n[stderr]: {stderr}"),
                };
                Ok(ToolResult::output(text))
            }
            ComputerAction::CopyToClipboard => {
                let copied = self.actuator.copy_selection().await?;
                self.settled(format!("Copied to clipboard: {copied}")).await
            }
        }
    }
}

/// Split a `key` combo such as `cmd+Shift+t` into normalized key names.
fn key_sequence(keys: &str) -> Vec<String> {
    keys.to_lowercase()
        .split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| match k {
            "cmd" | "super" => "command".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn description(&self) -> String {
        let target = self.scaling.target();
        format!(
            "Control a desktop with the mouse and keyboard and take screenshots. \
             The screen is {}x{} pixels; all coordinates are (x, y) from the top-left corner. \
             Take a screenshot before clicking to locate elements, click in the middle of targets, \
             and take another screenshot or wait when an application is slow to respond.",
            target.width, target.height
        )
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ACTIONS,
                    "description": "What to do. `key`/`hold_key` take a combo like \"ctrl+s\"; \
                        `type` enters text; clicks and `scroll` act at `coordinate` when given; \
                        `left_click_drag` drags from `start_coordinate` (or the cursor) to `coordinate`; \
                        `run_command` runs `text` as a shell command; `copy_to_clipboard` copies the selection."
                },
                "coordinate": {
                    "type": "array",
                    "items": { "type": "integer", "minimum": 0 },
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "(x, y) target. Required by mouse_move and left_click_drag."
                },
                "start_coordinate": {
                    "type": "array",
                    "items": { "type": "integer", "minimum": 0 },
                    "minItems": 2,
                    "maxItems": 2,
                    "description": "(x, y) drag origin for left_click_drag."
                },
                "text": {
                    "type": "string",
                    "description": "Required by key, hold_key, type and run_command. For scroll, keys held while scrolling."
                },
                "scroll_direction": {
                    "type": "string",
                    "enum": ["up", "down", "left", "right"],
                    "description": "Required by scroll."
                },
                "scroll_amount": {
                    "type": "integer",
                    "minimum": 0,
                    "description": "Wheel clicks. Required by scroll."
                },
                "duration": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": crate::action::MAX_DURATION_SECS,
                    "description": "Seconds. Required by hold_key and wait."
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult, ToolError> {
        let action = ComputerAction::try_from(input)?;
        debug!(action = action.name(), "Performing computer action");
        self.perform(action).await
    }
}
