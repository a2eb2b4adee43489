//! Text leaf widgets.
//!
//! Glyph rendering is delegated to the embedded-graphics mono font renderer;
//! the widget only keeps the string, font and color and repaints them at its
//! origin when dirty.

use core::fmt;

use embedded_graphics::Drawable as EgDrawable;
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle, ascii};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text as EgText};

use super::node::Payload;
use super::{WidgetError, WidgetId, WidgetKind, WidgetResult, WidgetTree};
use crate::surface::NodeSurface;

/// Fonts that can be requested by name, e.g. from the configuration.
const FONTS: &[(&str, &MonoFont<'static>)] = &[
    ("5x8", &ascii::FONT_5X8),
    ("6x9", &ascii::FONT_6X9),
    ("6x10", &ascii::FONT_6X10),
    ("6x12", &ascii::FONT_6X12),
    ("6x13", &ascii::FONT_6X13),
    ("6x13-bold", &ascii::FONT_6X13_BOLD),
    ("7x13", &ascii::FONT_7X13),
    ("7x14", &ascii::FONT_7X14),
    ("8x13", &ascii::FONT_8X13),
    ("9x15", &ascii::FONT_9X15),
    ("9x18", &ascii::FONT_9X18),
    ("10x20", &ascii::FONT_10X20),
];

/// Handle to a mono font and its metrics.
#[derive(Clone, Copy)]
pub struct FontHandle {
    name: &'static str,
    font: &'static MonoFont<'static>,
}

impl FontHandle {
    /// Look up a font by name (`"6x10"`, `"10x20"`, ...).
    pub fn by_name(name: &str) -> Option<Self> {
        FONTS
            .iter()
            .find(|(font_name, _)| *font_name == name)
            .map(|&(name, font)| Self { name, font })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Distance from the top of the text box to the baseline.
    pub fn ascender(&self) -> i32 {
        self.font.baseline as i32
    }

    /// Height of one line of text.
    pub fn line_height(&self) -> u32 {
        self.font.character_size.height
    }

    /// Size of the box `text` occupies on a single line.
    pub fn measure(&self, text: &str) -> Size {
        let chars = text.chars().count() as u32;
        let width = if chars == 0 {
            0
        } else {
            chars * self.font.character_size.width + (chars - 1) * self.font.character_spacing
        };
        Size::new(width, self.line_height())
    }

    /// Number of whole characters that fit into `width` pixels.
    pub fn chars_fitting(&self, width: u32) -> usize {
        let advance = self.font.character_size.width + self.font.character_spacing;
        ((width + self.font.character_spacing) / advance) as usize
    }
}

impl Default for FontHandle {
    fn default() -> Self {
        Self {
            name: "6x10",
            font: &ascii::FONT_6X10,
        }
    }
}

impl PartialEq for FontHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FontHandle({})", self.name)
    }
}

#[derive(Debug)]
pub(crate) struct TextPayload {
    pub(crate) text: String,
    pub(crate) font: FontHandle,
    pub(crate) color: Rgb565,
}

impl TextPayload {
    pub(crate) fn new(text: String, font: FontHandle, color: Rgb565) -> Self {
        Self { text, font, color }
    }

    pub(crate) fn paint(&self, target: &mut NodeSurface) {
        let style = MonoTextStyle::new(self.font.font, self.color);
        let text = EgText::with_baseline(&self.text, Point::zero(), style, Baseline::Top);
        let Ok(_) = text.draw(target);
    }
}

impl WidgetTree {
    /// Create a text widget sized to fit `text` on one line.
    pub fn create_text(
        &self,
        text: &str,
        font: FontHandle,
        color: Rgb565,
    ) -> WidgetResult<WidgetId> {
        self.create_text_sized(font.measure(text), text, font, color)
    }

    /// Create a text widget with an explicit size; text beyond it is clipped.
    pub fn create_text_sized(
        &self,
        size: Size,
        text: &str,
        font: FontHandle,
        color: Rgb565,
    ) -> WidgetResult<WidgetId> {
        let payload = TextPayload::new(text.into(), font, color);
        self.create_with(WidgetKind::Text, size, Payload::Text(payload))
    }

    /// Replace the string of a text widget, marking it dirty if it changed.
    ///
    /// The widget keeps its size.
    pub fn set_text(&self, id: WidgetId, text: &str) -> WidgetResult<()> {
        let node = self.node(id)?;
        let mut state = node.state();
        let Payload::Text(payload) = &mut state.payload else {
            return Err(WidgetError::WrongKind {
                id,
                expected: WidgetKind::Text,
                found: node.kind,
            });
        };
        if payload.text != text {
            payload.text.clear();
            payload.text.push_str(text);
            state.dirty = true;
        }
        Ok(())
    }

    pub fn text(&self, id: WidgetId) -> WidgetResult<String> {
        let node = self.node(id)?;
        let state = node.state();
        match &state.payload {
            Payload::Text(payload) => Ok(payload.text.clone()),
            _ => Err(WidgetError::WrongKind {
                id,
                expected: WidgetKind::Text,
                found: node.kind,
            }),
        }
    }
}
