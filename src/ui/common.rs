//! # UI Common Components
//!
//! Shared styling for the operator window. The palette is a fixed dark theme
//! with two status colors used by the status bar and the dialog border.

use eframe::egui::{Color32, Frame, RichText, Stroke};

use crate::link::LinkState;

/// Creates a styled frame with consistent margins and border.
pub fn create_frame(bg_color: Color32, border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(bg_color)
        .inner_margin(4)
        .outer_margin(2)
}

/// Colored label text for the link indicator.
pub fn link_label(state: LinkState) -> RichText {
    let (text, color) = match state {
        LinkState::Connecting => ("Link: connecting", UiColors::PENDING),
        LinkState::Open => ("Link: open", UiColors::ACTIVE),
        LinkState::Closed => ("Link: closed", UiColors::INACTIVE),
    };
    RichText::new(text).color(color)
}

/// Color palette for the operator window.
///
/// Background colors run darkest to lightest: EXTREME_BG, INNER_BG, MAIN_BG.
/// ACTIVE marks an open link or a present device, INACTIVE the opposite.
pub struct UiColors;

impl UiColors {
    /// Primary background color for main content areas (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Secondary background color for nested components (RGB: 25, 25, 25)
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    /// Deepest background color, used behind the confirmation dialog (RGB: 20, 20, 20)
    pub const EXTREME_BG: Color32 = Color32::from_rgb(20, 20, 20);

    /// Border color for component separation (RGB: 60, 60, 60)
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Active/connected status indicator color (RGB: 50, 200, 20) - Green
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Inactive/disconnected status indicator color (RGB: 200, 50, 20) - Red
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    /// Link still being established (RGB: 220, 170, 30) - Amber
    pub const PENDING: Color32 = Color32::from_rgb(220, 170, 30);
}
