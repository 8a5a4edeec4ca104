//! Theme and Colors
//!
//! The manual assistant's palette: a calm blue accent for the bot and the
//! picker, green for the user, and muted grays for metadata.

use ratatui::style::{Color, Modifier, Style};

use manual_conductor::NotifyLevel;

// ============================================================================
// Accent Palette
// ============================================================================

/// Bot name, headings, highlighted picker row
pub const ACCENT_BLUE: Color = Color::Rgb(90, 160, 255);

/// Softer accent for borders and titles
pub const ACCENT_SOFT: Color = Color::Rgb(140, 180, 230);

/// Link text
pub const LINK_BLUE: Color = Color::Rgb(120, 190, 255);

/// Inline and block code
pub const CODE_ORANGE: Color = Color::Rgb(255, 190, 120);

// ============================================================================
// UI Colors
// ============================================================================

/// User input green
pub const USER_GREEN: Color = Color::Rgb(130, 220, 130);

/// Bot body text
pub const BOT_TEXT: Color = Color::Rgb(225, 225, 225);

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Citation lines
pub const SOURCE_GRAY: Color = Color::Rgb(150, 150, 160);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Warning amber
pub const WARNING_YELLOW: Color = Color::Rgb(255, 200, 80);

/// Success green
pub const SUCCESS_GREEN: Color = Color::Rgb(120, 230, 120);

// ============================================================================
// Styles
// ============================================================================

/// Style for a notification of `level`
pub fn notify_style(level: NotifyLevel) -> Style {
    let color = match level {
        NotifyLevel::Info => ACCENT_SOFT,
        NotifyLevel::Warning => WARNING_YELLOW,
        NotifyLevel::Error => ERROR_RED,
        NotifyLevel::Success => SUCCESS_GREEN,
    };
    Style::default().fg(color)
}

/// Role label style
pub fn label_style(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Metadata (timestamps, hints)
pub fn dim() -> Style {
    Style::default().fg(DIM_GRAY)
}
