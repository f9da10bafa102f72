//! Logical ↔ physical coordinate mapping.
//!
//! The model always sees a fixed logical screen (1366×768, FWXGA) no matter
//! what the real display is. Logical coordinates coming from the model are
//! divided by the per-axis factor `target / physical`; physical coordinates
//! going back are multiplied by it. Both directions round to the nearest
//! pixel, so a round trip lands within one unit of where it started.

use deskpilot_core::error::ToolError;

use crate::actuator::{Point, Resolution};

/// FWXGA
pub const LOGICAL_TARGET: Resolution = Resolution::new(1366, 768);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingContext {
    target: Resolution,
    physical: Resolution,
}

impl ScalingContext {
    pub fn new(physical: Resolution) -> Self {
        Self::with_target(LOGICAL_TARGET, physical)
    }

    pub fn with_target(target: Resolution, physical: Resolution) -> Self {
        Self { target, physical }
    }

    pub fn target(&self) -> Resolution {
        self.target
    }

    pub fn physical(&self) -> Resolution {
        self.physical
    }

    fn factors(&self) -> (f64, f64) {
        (
            f64::from(self.target.width) / f64::from(self.physical.width.max(1)),
            f64::from(self.target.height) / f64::from(self.physical.height.max(1)),
        )
    }

    /// Map a model-supplied coordinate onto the real screen.
    pub fn to_physical(&self, logical: Point) -> Result<Point, ToolError> {
        if logical.x > self.target.width || logical.y > self.target.height {
            return Err(ToolError::InvalidArguments(format!(
                "coordinate ({logical}) is out of bounds for a {}x{} screen",
                self.target.width, self.target.height
            )));
        }
        let (fx, fy) = self.factors();
        Ok(Point::new(
            (f64::from(logical.x) / fx).round() as u32,
            (f64::from(logical.y) / fy).round() as u32,
        ))
    }

    /// Map a real-screen coordinate into the model's frame.
    pub fn to_logical(&self, physical: Point) -> Point {
        let (fx, fy) = self.factors();
        Point::new(
            (f64::from(physical.x) * fx).round() as u32,
            (f64::from(physical.y) * fy).round() as u32,
        )
    }
}
