//! Screen-control tooling for deskpilot.
//!
//! The [`computer::ComputerTool`] turns the model's `computer` tool calls
//! into [`actuator::Actuator`] calls. Whatever drives the real display is
//! supplied by the embedder as an `Arc<dyn Actuator>`.

pub mod action;
pub mod actuator;
pub mod computer;
pub mod scaling;

#[cfg(test)]
pub(crate) mod test_helpers;

use deskpilot_core::tool::ToolRegistry;

pub use action::{ACTIONS, ActionRequest, ComputerAction};
pub use actuator::{
    Actuator, ActuatorError, CommandOutput, MouseButton, Point, Resolution, ScrollDirection,
};
pub use computer::{ComputerOptions, ComputerTool};
pub use scaling::{LOGICAL_TARGET, ScalingContext};

/// Registry holding the computer tool.
pub fn registry(computer: ComputerTool) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(computer));
    registry
}
