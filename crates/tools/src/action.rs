//! Parsing and validation of `computer` tool input.
//!
//! The model's raw `tool_use.input` is deserialized into an [`ActionRequest`]
//! and then checked against the per-action rules into a [`ComputerAction`].
//! Every rejection names the offending field. Coordinates stay logical here;
//! scaling happens at execution time.

use deskpilot_core::error::ToolError;
use serde::Deserialize;
use serde_json::Value;

use crate::actuator::{MouseButton, Point, ScrollDirection};

/// Longest accepted `duration`, in seconds.
pub const MAX_DURATION_SECS: f64 = 100.0;

/// Every action name the tool accepts, in schema order.
pub const ACTIONS: &[&str] = &[
    "key",
    "hold_key",
    "type",
    "cursor_position",
    "mouse_move",
    "left_mouse_down",
    "left_mouse_up",
    "left_click",
    "left_click_drag",
    "right_click",
    "middle_click",
    "double_click",
    "triple_click",
    "scroll",
    "wait",
    "screenshot",
    "run_command",
    "copy_to_clipboard",
];

/// Raw tool input. Numeric fields are kept as JSON so a wrong type can be
/// reported against the field that carried it.
#[derive(Debug, Default, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub coordinate: Option<Value>,
    #[serde(default)]
    pub start_coordinate: Option<Value>,
    #[serde(default)]
    pub scroll_direction: Option<String>,
    #[serde(default)]
    pub scroll_amount: Option<Value>,
    #[serde(default)]
    pub duration: Option<Value>,
}

/// A validated action with logical coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputerAction {
    Key { keys: String },
    HoldKey { keys: String, seconds: f64 },
    Type { text: String },
    CursorPosition,
    MouseMove { to: Point },
    LeftMouseDown,
    LeftMouseUp,
    Click { button: MouseButton, count: u8, at: Option<Point> },
    LeftClickDrag { from: Option<Point>, to: Point },
    Scroll { direction: ScrollDirection, amount: u32, at: Option<Point>, modifier: Option<String> },
    Wait { seconds: f64 },
    Screenshot,
    RunCommand { command: String },
    CopyToClipboard,
}

impl ComputerAction {
    /// Action name as the model spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Key { .. } => "key",
            Self::HoldKey { .. } => "hold_key",
            Self::Type { .. } => "type",
            Self::CursorPosition => "cursor_position",
            Self::MouseMove { .. } => "mouse_move",
            Self::LeftMouseDown => "left_mouse_down",
            Self::LeftMouseUp => "left_mouse_up",
            Self::Click { button: MouseButton::Left, count: 1, .. } => "left_click",
            Self::Click { button: MouseButton::Left, count: 2, .. } => "double_click",
            Self::Click { button: MouseButton::Left, .. } => "triple_click",
            Self::Click { button: MouseButton::Right, .. } => "right_click",
            Self::Click { button: MouseButton::Middle, .. } => "middle_click",
            Self::LeftClickDrag { .. } => "left_click_drag",
            Self::Scroll { .. } => "scroll",
            Self::Wait { .. } => "wait",
            Self::Screenshot => "screenshot",
            Self::RunCommand { .. } => "run_command",
            Self::CopyToClipboard => "copy_to_clipboard",
        }
    }
}

impl TryFrom<Value> for ComputerAction {
    type Error = ToolError;

    fn try_from(input: Value) -> Result<Self, Self::Error> {
        let request: ActionRequest = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid computer input: {e}")))?;
        request.validate()
    }
}

impl ActionRequest {
    /// Check the request against its action's required and forbidden fields.
    pub fn validate(self) -> Result<ComputerAction, ToolError> {
        let action = self.action.as_str();
        match action {
            "mouse_move" => {
                self.forbid_text()?;
                Ok(ComputerAction::MouseMove { to: self.require_coordinate()? })
            }
            "left_click_drag" => {
                self.forbid_text()?;
                let to = self.require_coordinate()?;
                let from = parse_coordinate("start_coordinate", self.start_coordinate.as_ref())?;
                Ok(ComputerAction::LeftClickDrag { from, to })
            }
            "key" => {
                self.forbid_coordinate()?;
                Ok(ComputerAction::Key { keys: self.require_text()? })
            }
            "type" => {
                self.forbid_coordinate()?;
                Ok(ComputerAction::Type { text: self.require_text()? })
            }
            "hold_key" => {
                let keys = self.require_text()?;
                let seconds = self.require_duration()?;
                Ok(ComputerAction::HoldKey { keys, seconds })
            }
            "left_click" | "right_click" | "middle_click" | "double_click" | "triple_click" => {
                self.forbid_text()?;
                let (button, count) = match action {
                    "right_click" => (MouseButton::Right, 1),
                    "middle_click" => (MouseButton::Middle, 1),
                    "double_click" => (MouseButton::Left, 2),
                    "triple_click" => (MouseButton::Left, 3),
                    _ => (MouseButton::Left, 1),
                };
                let at = parse_coordinate("coordinate", self.coordinate.as_ref())?;
                Ok(ComputerAction::Click { button, count, at })
            }
            "left_mouse_down" | "left_mouse_up" => {
                self.forbid_text()?;
                self.forbid_coordinate()?;
                Ok(if action == "left_mouse_down" {
                    ComputerAction::LeftMouseDown
                } else {
                    ComputerAction::LeftMouseUp
                })
            }
            "scroll" => {
                let direction = self
                    .scroll_direction
                    .as_deref()
                    .and_then(|d| d.parse::<ScrollDirection>().ok())
                    .ok_or_else(|| {
                        ToolError::InvalidArguments(
                            "scroll_direction must be 'up', 'down', 'left', or 'right'".into(),
                        )
                    })?;
                let amount = self
                    .scroll_amount
                    .as_ref()
                    .and_then(Value::as_u64)
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| {
                        ToolError::InvalidArguments(
                            "scroll_amount must be a non-negative integer".into(),
                        )
                    })?;
                let at = parse_coordinate("coordinate", self.coordinate.as_ref())?;
                Ok(ComputerAction::Scroll {
                    direction,
                    amount,
                    at,
                    modifier: self.text.filter(|t| !t.is_empty()),
                })
            }
            "cursor_position" | "screenshot" => {
                self.forbid_text()?;
                Ok(if action == "screenshot" {
                    ComputerAction::Screenshot
                } else {
                    ComputerAction::CursorPosition
                })
            }
            "wait" => Ok(ComputerAction::Wait { seconds: self.require_duration()? }),
            "run_command" => {
                self.forbid_coordinate()?;
                Ok(ComputerAction::RunCommand { command: self.require_text()? })
            }
            "copy_to_clipboard" => {
                self.forbid_text()?;
                self.forbid_coordinate()?;
                Ok(ComputerAction::CopyToClipboard)
            }
            other => Err(ToolError::InvalidArguments(format!(
                "action '{other}' is not supported; expected one of: {}",
                ACTIONS.join(", ")
            ))),
        }
    }

    fn require_text(&self) -> Result<String, ToolError> {
        self.text.clone().ok_or_else(|| {
            ToolError::InvalidArguments(format!("text is required for {}", self.action))
        })
    }

    fn forbid_text(&self) -> Result<(), ToolError> {
        match self.text {
            Some(_) => Err(ToolError::InvalidArguments(format!(
                "text is not accepted for {}",
                self.action
            ))),
            None => Ok(()),
        }
    }

    fn require_coordinate(&self) -> Result<Point, ToolError> {
        parse_coordinate("coordinate", self.coordinate.as_ref())?.ok_or_else(|| {
            ToolError::InvalidArguments(format!("coordinate is required for {}", self.action))
        })
    }

    fn forbid_coordinate(&self) -> Result<(), ToolError> {
        match self.coordinate {
            Some(_) => Err(ToolError::InvalidArguments(format!(
                "coordinate is not accepted for {}",
                self.action
            ))),
            None => Ok(()),
        }
    }

    fn require_duration(&self) -> Result<f64, ToolError> {
        let seconds = self
            .duration
            .as_ref()
            .and_then(Value::as_f64)
            .filter(|d| *d >= 0.0)
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "duration must be a non-negative number for {}",
                    self.action
                ))
            })?;
        if seconds > MAX_DURATION_SECS {
            return Err(ToolError::InvalidArguments(format!(
                "duration must not exceed {MAX_DURATION_SECS} seconds"
            )));
        }
        Ok(seconds)
    }
}

/// A coordinate is a two-element list of non-negative integers.
fn parse_coordinate(field: &str, value: Option<&Value>) -> Result<Option<Point>, ToolError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let invalid = || {
        ToolError::InvalidArguments(format!(
            "{field} must be a list of two non-negative integers, got {value}"
        ))
    };
    let items = value.as_array().filter(|a| a.len() == 2).ok_or_else(invalid)?;
    let mut xy = items
        .iter()
        .map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()));
    match (xy.next().flatten(), xy.next().flatten()) {
        (Some(x), Some(y)) => Ok(Some(Point::new(x, y))),
        _ => Err(invalid()),
    }
}
