//! Shared test helpers for computer tool tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::actuator::{
    Actuator, ActuatorError, CommandOutput, MouseButton, Point, Resolution, ScrollDirection,
};

/// 1×1 transparent PNG.
pub const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// An actuator that records every call as a string and never touches a
/// screen.
pub struct RecordingActuator {
    pub size: Option<Resolution>,
    pub cursor: Mutex<Point>,
    pub calls: Mutex<Vec<String>>,
    pub fail_screenshot: bool,
    pub command_output: CommandOutput,
    pub clipboard: String,
    pub fail_key_down: Option<String>,
    pub fail_key_up: Option<String>,
}

impl RecordingActuator {
    pub fn new(size: Resolution) -> Self {
        Self {
            size: Some(size),
            cursor: Mutex::new(Point::new(0, 0)),
            calls: Mutex::new(Vec::new()),
            fail_screenshot: false,
            command_output: CommandOutput::default(),
            clipboard: String::new(),
            fail_key_down: None,
            fail_key_up: None,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn screen_size(&self) -> Result<Resolution, ActuatorError> {
        self.size
            .ok_or_else(|| ActuatorError::Unavailable("no display".into()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, ActuatorError> {
        self.record("screenshot".into());
        if self.fail_screenshot {
            return Err(ActuatorError::Failed {
                operation: "screenshot".into(),
                reason: "capture denied".into(),
            });
        }
        Ok(PIXEL_PNG.to_vec())
    }

    async fn cursor_position(&self) -> Result<Point, ActuatorError> {
        Ok(*self.cursor.lock().unwrap())
    }

    async fn move_cursor(&self, to: Point) -> Result<(), ActuatorError> {
        *self.cursor.lock().unwrap() = to;
        self.record(format!("move {} {}", to.x, to.y));
        Ok(())
    }

    async fn click(&self, button: MouseButton, count: u8) -> Result<(), ActuatorError> {
        self.record(format!("click {button:?} x{count}"));
        Ok(())
    }

    async fn mouse_down(&self, button: MouseButton) -> Result<(), ActuatorError> {
        self.record(format!("down {button:?}"));
        Ok(())
    }

    async fn mouse_up(&self, button: MouseButton) -> Result<(), ActuatorError> {
        self.record(format!("up {button:?}"));
        Ok(())
    }

    async fn drag_to(&self, to: Point, button: MouseButton, _duration: Duration) -> Result<(), ActuatorError> {
        *self.cursor.lock().unwrap() = to;
        self.record(format!("drag {button:?} {} {}", to.x, to.y));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), ActuatorError> {
        self.record(format!("type {text}"));
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), ActuatorError> {
        self.record(format!("hotkey {}", keys.join(" ")));
        Ok(())
    }

    async fn key_down(&self, key: &str) -> Result<(), ActuatorError> {
        if self.fail_key_down.as_deref() == Some(key) {
            return Err(ActuatorError::Failed {
                operation: "key_down".into(),
                reason: format!("unknown key {key}"),
            });
        }
        self.record(format!("key_down {key}"));
        Ok(())
    }

    async fn key_up(&self, key: &str) -> Result<(), ActuatorError> {
        if self.fail_key_up.as_deref() == Some(key) {
            return Err(ActuatorError::Failed {
                operation: "key_up".into(),
                reason: format!("cannot release {key}"),
            });
        }
        self.record(format!("key_up {key}"));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, clicks: u32) -> Result<(), ActuatorError> {
        self.record(format!("scroll {direction} {clicks}"));
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput, ActuatorError> {
        self.record(format!("run {command}"));
        Ok(self.command_output.clone())
    }

    async fn copy_selection(&self) -> Result<String, ActuatorError> {
        self.record("copy".into());
        Ok(self.clipboard.clone())
    }
}
