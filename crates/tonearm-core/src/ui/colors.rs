//! Color definitions for the player screens
//!
//! All colors are RGB565, matching the 16-bit panel.
//!
//! To convert from 8-bit RGB: R>>3, G>>2, B>>3

use embedded_graphics::pixelcolor::Rgb565;

// ============================================================================
// Surfaces
// ============================================================================

/// Screen background - very dark gray-blue
pub const COLOR_BACKGROUND: Rgb565 = Rgb565::new(18 >> 3, 23 >> 2, 24 >> 3);

/// Header strip background - slightly lighter than the screen
pub const COLOR_HEADER: Rgb565 = Rgb565::new(26 >> 3, 32 >> 2, 33 >> 3);

/// Slider track and empty artwork frame - medium gray
pub const COLOR_STROKE: Rgb565 = Rgb565::new(43 >> 3, 55 >> 2, 57 >> 3);

/// Highlight behind the current queue row
pub const COLOR_CURSOR_ROW: Rgb565 = Rgb565::new(29 >> 3, 47 >> 2, 43 >> 3);

// ============================================================================
// Text
// ============================================================================

/// Primary text - near white
pub const COLOR_TEXT_PRIMARY: Rgb565 = Rgb565::new(235 >> 3, 238 >> 2, 240 >> 3);

/// Secondary text (artist, album, queue rows) - light gray
pub const COLOR_TEXT_SECONDARY: Rgb565 = Rgb565::new(160 >> 3, 168 >> 2, 172 >> 3);

/// Dimmed text (stopped state, unregistered device)
pub const COLOR_TEXT_MUTED: Rgb565 = Rgb565::new(100 >> 3, 108 >> 2, 112 >> 3);

// ============================================================================
// Accents
// ============================================================================

/// Slider fill and "playing" indicator - bright teal-green
pub const COLOR_ACCENT: Rgb565 = Rgb565::new(95 >> 3, 185 >> 2, 141 >> 3);

/// Muted volume / failed artwork - muted red
pub const COLOR_WARNING: Rgb565 = Rgb565::new(190 >> 3, 95 >> 2, 95 >> 3);
