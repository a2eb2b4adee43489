//! Image leaf widgets.
//!
//! Fetching and decoding happen outside the compositor. An image widget is
//! created in [`DecodeState::Pending`] and shows only its background until
//! decoded pixels are handed over with [`WidgetTree::set_image_pixels`].

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use super::node::Payload;
use super::{WidgetError, WidgetId, WidgetKind, WidgetResult, WidgetTree};
use crate::surface::NodeSurface;

/// Progress of the external decode for an image widget.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecodeState {
    /// Waiting for pixels.
    #[default]
    Pending,
    /// Decoded row-major pixels.
    Ready(Vec<Rgb565>),
    /// Fetch or decode failed; the widget stays a placeholder.
    Failed,
}

#[derive(Debug)]
pub(crate) struct ImagePayload {
    pub(crate) source: String,
    pub(crate) state: DecodeState,
}

impl ImagePayload {
    pub(crate) fn new(source: String) -> Self {
        Self {
            source,
            state: DecodeState::Pending,
        }
    }

    /// Blit decoded pixels at the origin. A buffer that does not exactly cover
    /// the widget is a backend error and leaves the widget dirty.
    pub(crate) fn paint(
        &self,
        id: WidgetId,
        size: Size,
        target: &mut NodeSurface,
    ) -> WidgetResult<()> {
        let DecodeState::Ready(pixels) = &self.state else {
            return Ok(());
        };
        let expected = size.width as usize * size.height as usize;
        if pixels.len() != expected {
            return Err(WidgetError::ImageSize {
                id,
                expected,
                actual: pixels.len(),
            });
        }
        let area = Rectangle::new(Point::zero(), size);
        let Ok(()) = target.fill_contiguous(&area, pixels.iter().copied());
        Ok(())
    }
}

impl WidgetTree {
    /// Create an image widget for `source` awaiting decoded pixels.
    pub fn create_image(&self, size: Size, source: &str) -> WidgetResult<WidgetId> {
        self.create_with(
            WidgetKind::Image,
            size,
            Payload::Image(ImagePayload::new(source.into())),
        )
    }

    fn with_image<R>(
        &self,
        id: WidgetId,
        f: impl FnOnce(&mut ImagePayload, &mut bool) -> R,
    ) -> WidgetResult<R> {
        let node = self.node(id)?;
        let mut state = node.state();
        let state = &mut *state;
        match &mut state.payload {
            Payload::Image(image) => Ok(f(image, &mut state.dirty)),
            _ => Err(WidgetError::WrongKind {
                id,
                expected: WidgetKind::Image,
                found: node.kind,
            }),
        }
    }

    /// Hand decoded row-major pixels to an image widget and mark it dirty.
    ///
    /// Must be called on the compositor thread, typically from the render
    /// callback that runs after a decode-completion update request.
    pub fn set_image_pixels(&self, id: WidgetId, pixels: Vec<Rgb565>) -> WidgetResult<()> {
        self.with_image(id, |image, dirty| {
            image.state = DecodeState::Ready(pixels);
            *dirty = true;
        })
    }

    /// Record that decoding failed; the widget keeps showing its background.
    pub fn mark_image_failed(&self, id: WidgetId) -> WidgetResult<()> {
        self.with_image(id, |image, dirty| {
            if image.state != DecodeState::Failed {
                image.state = DecodeState::Failed;
                *dirty = true;
            }
        })
    }

    pub fn image_source(&self, id: WidgetId) -> WidgetResult<String> {
        self.with_image(id, |image, _| image.source.clone())
    }

    pub fn decode_state(&self, id: WidgetId) -> WidgetResult<DecodeState> {
        self.with_image(id, |image, _| image.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_image_paints_background_only() {
        let tree = WidgetTree::new();
        let id = tree.create_image(Size::new(2, 2), "cover.jpg").unwrap();
        tree.set_background(id, Some(Rgb565::BLUE)).unwrap();
        tree.redraw(id).unwrap();

        assert_eq!(tree.decode_state(id).unwrap(), DecodeState::Pending);
        let pixel = tree.with_surface(id, |s| s.pixel(Point::new(1, 1))).unwrap();
        assert_eq!(pixel, Some(Rgb565::BLUE));
    }

    #[test]
    fn test_ready_image_blits_pixels() {
        let tree = WidgetTree::new();
        let id = tree.create_image(Size::new(2, 1), "cover.jpg").unwrap();
        tree.redraw(id).unwrap();

        tree.set_image_pixels(id, vec![Rgb565::RED, Rgb565::GREEN])
            .unwrap();
        assert!(tree.is_dirty(id).unwrap());
        tree.redraw(id).unwrap();

        let (left, right) = tree
            .with_surface(id, |s| (s.pixel(Point::new(0, 0)), s.pixel(Point::new(1, 0))))
            .unwrap();
        assert_eq!(left, Some(Rgb565::RED));
        assert_eq!(right, Some(Rgb565::GREEN));
    }

    #[test]
    fn test_mismatched_pixels_keep_widget_dirty() {
        let tree = WidgetTree::new();
        let id = tree.create_image(Size::new(2, 2), "cover.jpg").unwrap();
        tree.set_image_pixels(id, vec![Rgb565::RED; 3]).unwrap();

        assert_eq!(
            tree.redraw(id),
            Err(WidgetError::ImageSize {
                id,
                expected: 4,
                actual: 3
            })
        );
        assert!(tree.is_dirty(id).unwrap());

        tree.set_image_pixels(id, vec![Rgb565::RED; 4]).unwrap();
        tree.redraw(id).unwrap();
        assert!(!tree.is_dirty(id).unwrap());
    }

    #[test]
    fn test_source_and_failure_state() {
        let tree = WidgetTree::new();
        let id = tree.create_image(Size::new(1, 1), "http://host/a.png").unwrap();
        assert_eq!(tree.image_source(id).unwrap(), "http://host/a.png");

        tree.redraw(id).unwrap();
        tree.mark_image_failed(id).unwrap();
        assert_eq!(tree.decode_state(id).unwrap(), DecodeState::Failed);
        assert!(tree.is_dirty(id).unwrap());
    }
}
