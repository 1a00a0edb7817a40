//! Pointer input events and the gesture tracked between press and release.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Pointer event type for unified mouse/touch handling.
///
/// Positions are in screen pixels relative to the drawing surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Scroll {
        position: Point,
        delta: Vec2,
    },
}

/// Zoom factor for a wheel delta: scrolling up zooms in.
///
/// Returns `None` for a purely horizontal or empty delta.
pub fn wheel_factor(delta: Vec2, step: f64) -> Option<f64> {
    if delta.y < 0.0 {
        Some(step)
    } else if delta.y > 0.0 {
        Some(1.0 / step)
    } else {
        None
    }
}

/// Whether pointer travel reaches the click threshold on either axis.
pub fn exceeds_threshold(from: Point, to: Point, threshold: f64) -> bool {
    (to.x - from.x).abs() >= threshold || (to.y - from.y).abs() >= threshold
}

/// Gesture in progress between pointer-down and pointer-up.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Panning the view.
    Pan {
        press: Point,
        last: Point,
        moved: bool,
    },
    /// Dragging an item. `offset` is the pointer position relative to the
    /// item origin, in world units.
    Drag {
        name: String,
        offset: Vec2,
        press: Point,
        moved: bool,
    },
}

impl Gesture {
    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }

    /// Name of the item being dragged, if any.
    pub fn dragged(&self) -> Option<&str> {
        match self {
            Gesture::Drag { name, .. } => Some(name),
            Gesture::Idle | Gesture::Pan { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wheel_direction() {
        assert_eq!(wheel_factor(Vec2::new(0.0, -120.0), 1.1), Some(1.1));
        let out = wheel_factor(Vec2::new(0.0, 3.0), 1.1).unwrap();
        assert!((out - 1.0 / 1.1).abs() < 1e-12);
        assert_eq!(wheel_factor(Vec2::new(5.0, 0.0), 1.1), None);
    }

    #[test]
    fn test_threshold_per_axis() {
        let start = Point::new(100.0, 100.0);
        assert!(!exceeds_threshold(start, Point::new(104.0, 96.0), 5.0));
        assert!(exceeds_threshold(start, Point::new(105.0, 100.0), 5.0));
        assert!(exceeds_threshold(start, Point::new(100.0, 94.0), 5.0));
    }

    #[test]
    fn test_dragged_name() {
        let drag = Gesture::Drag {
            name: "A1".into(),
            offset: Vec2::ZERO,
            press: Point::ZERO,
            moved: false,
        };
        assert_eq!(drag.dragged(), Some("A1"));
        assert!(Gesture::default().is_idle());
    }
}
