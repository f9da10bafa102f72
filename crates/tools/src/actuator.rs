//! Actuator port: the boundary to whatever physically drives the screen.
//!
//! The computer tool never touches a display directly; it is handed an
//! `Arc<dyn Actuator>` at construction. Implementations may drive a local
//! desktop, a VM, or a remote session. All coordinates crossing this
//! boundary are physical pixels.

use async_trait::async_trait;
use deskpilot_core::error::ToolError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl std::str::FromStr for ScrollDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(s)
    }
}

/// Captured output of a command run on the controlled machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("actuator unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} failed: {reason}")]
    Failed { operation: String, reason: String },
}

impl From<ActuatorError> for ToolError {
    fn from(err: ActuatorError) -> Self {
        ToolError::ExecutionFailed {
            tool_name: "computer".into(),
            reason: err.to_string(),
        }
    }
}

/// Physical input/output on the controlled machine.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn screen_size(&self) -> Result<Resolution, ActuatorError>;

    /// PNG-encoded capture of the whole screen.
    async fn screenshot(&self) -> Result<Vec<u8>, ActuatorError>;

    async fn cursor_position(&self) -> Result<Point, ActuatorError>;

    async fn move_cursor(&self, to: Point) -> Result<(), ActuatorError>;

    /// Click `count` times at the current cursor position.
    async fn click(&self, button: MouseButton, count: u8) -> Result<(), ActuatorError>;

    async fn mouse_down(&self, button: MouseButton) -> Result<(), ActuatorError>;

    async fn mouse_up(&self, button: MouseButton) -> Result<(), ActuatorError>;

    /// Press `button`, move to `to` over `duration`, release.
    async fn drag_to(&self, to: Point, button: MouseButton, duration: Duration) -> Result<(), ActuatorError>;

    async fn type_text(&self, text: &str) -> Result<(), ActuatorError>;

    /// Press the keys together, release in reverse order.
    async fn hotkey(&self, keys: &[String]) -> Result<(), ActuatorError>;

    async fn key_down(&self, key: &str) -> Result<(), ActuatorError>;

    async fn key_up(&self, key: &str) -> Result<(), ActuatorError>;

    async fn scroll(&self, direction: ScrollDirection, clicks: u32) -> Result<(), ActuatorError>;

    async fn run_command(&self, command: &str) -> Result<CommandOutput, ActuatorError>;

    /// Copy the current selection and return the clipboard contents.
    async fn copy_selection(&self) -> Result<String, ActuatorError>;
}
