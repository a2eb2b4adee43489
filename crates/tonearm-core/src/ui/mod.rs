//! Display geometry, palette and anchor placement shared by every screen.

pub mod anchor;
pub mod colors;

pub use anchor::Anchor;

/// Default panel width in pixels.
pub const DISPLAY_WIDTH_PX: u32 = 320;

/// Default panel height in pixels.
pub const DISPLAY_HEIGHT_PX: u32 = 240;
