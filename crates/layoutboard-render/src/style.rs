//! Board palette and screen-space metrics.
//!
//! Metrics are in screen pixels; the frame builder divides them by the view
//! scale so items keep a constant on-screen size for chrome and text.

use layoutboard_core::Priority;
use peniko::Color;

pub const ITEM_FILL: Color = Color::from_rgba8(31, 41, 55, 230);
/// Fill of items owned by someone else, as seen by an admin.
pub const ITEM_FILL_FOREIGN: Color = Color::from_rgba8(55, 65, 81, 204);
pub const ITEM_BORDER: Color = Color::from_rgba8(75, 85, 99, 255);
pub const BORDER_MISSING_PARTS: Color = Color::from_rgba8(249, 115, 22, 255);
pub const BORDER_PAUSED: Color = Color::from_rgba8(239, 68, 68, 255);
pub const BORDER_HIGHLIGHT: Color = Color::from_rgba8(52, 211, 153, 255);

pub const PROGRESS_TRACK: Color = Color::from_rgba8(17, 24, 39, 128);
pub const PROGRESS_FILL: Color = Color::from_rgba8(59, 130, 246, 255);

pub const TEXT_PRIMARY: Color = Color::WHITE;
pub const TEXT_MUTED: Color = Color::from_rgba8(156, 163, 175, 255);
pub const BADGE_TEXT: Color = Color::BLACK;
pub const BADGE_COMPLETE: Color = Color::from_rgba8(74, 222, 128, 255);

pub const ICON_BOLT: Color = Color::from_rgba8(250, 204, 21, 255);
pub const ICON_CHECK: Color = Color::from_rgba8(56, 189, 248, 255);
pub const ICON_BOX: Color = Color::from_rgba8(251, 146, 60, 255);
pub const ICON_MISSING_PARTS: Color = Color::from_rgba8(249, 115, 22, 255);
pub const ICON_ALERT: Color = Color::from_rgba8(239, 68, 68, 255);

/// Canvas clear color.
pub const BACKGROUND: Color = Color::from_rgba8(17, 24, 39, 255);

pub const LINE_WIDTH: f64 = 1.0;
pub const PAUSED_LINE_WIDTH: f64 = 2.5;
pub const HIGHLIGHT_LINE_WIDTH: f64 = 3.0;
pub const CORNER_RADIUS: f64 = 6.0;
pub const PADDING: f64 = 8.0;
pub const PROGRESS_HEIGHT: f64 = 10.0;
pub const FONT_SIZE: f64 = 12.0;
pub const SUB_FONT_SIZE: f64 = 10.0;
pub const OWNER_FONT_SIZE: f64 = 9.0;
pub const BADGE_FONT_SCALE: f64 = 1.1;
pub const ICON_SIZE: f64 = 16.0;
pub const ICON_SPACING: f64 = 8.0;
pub const PRIORITY_DOT_RADIUS: f64 = 5.0;
pub const ICON_LINE_WIDTH: f64 = 1.5;
pub const CHECK_LINE_WIDTH: f64 = 2.5;

/// Dot color for a priority; `Low` has none.
pub fn priority_color(priority: Priority) -> Option<Color> {
    match priority {
        Priority::Urgent => Some(Color::from_rgba8(239, 68, 68, 255)),
        Priority::High => Some(Color::from_rgba8(249, 115, 22, 255)),
        Priority::Normal => Some(Color::from_rgba8(59, 130, 246, 255)),
        Priority::Low => None,
    }
}
