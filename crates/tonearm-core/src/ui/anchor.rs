//! Anchor points used to place a widget inside its container.
//!
//! An anchor names the point of the child rectangle that should land on the
//! reference point passed to
//! [`WidgetTree::container_add`](crate::widget::WidgetTree::container_add).
//! It is applied exactly once: the resolved top-left corner is what the tree
//! stores as the child's offset.

use embedded_graphics::prelude::*;

/// Horizontal component of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizontal {
    Left,
    Center,
    Right,
}

/// Vertical component of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vertical {
    Top,
    Center,
    Bottom,
    Baseline,
}

/// One of the nine rectangle points, plus the text baseline variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
    /// Left edge on the text baseline. Only valid for text widgets.
    BaselineLeft,
    /// Horizontal center on the text baseline. Only valid for text widgets.
    Baseline,
    /// Right edge on the text baseline. Only valid for text widgets.
    BaselineRight,
}

impl Anchor {
    fn split(self) -> (Horizontal, Vertical) {
        match self {
            Anchor::TopLeft => (Horizontal::Left, Vertical::Top),
            Anchor::Top => (Horizontal::Center, Vertical::Top),
            Anchor::TopRight => (Horizontal::Right, Vertical::Top),
            Anchor::Left => (Horizontal::Left, Vertical::Center),
            Anchor::Center => (Horizontal::Center, Vertical::Center),
            Anchor::Right => (Horizontal::Right, Vertical::Center),
            Anchor::BottomLeft => (Horizontal::Left, Vertical::Bottom),
            Anchor::Bottom => (Horizontal::Center, Vertical::Bottom),
            Anchor::BottomRight => (Horizontal::Right, Vertical::Bottom),
            Anchor::BaselineLeft => (Horizontal::Left, Vertical::Baseline),
            Anchor::Baseline => (Horizontal::Center, Vertical::Baseline),
            Anchor::BaselineRight => (Horizontal::Right, Vertical::Baseline),
        }
    }

    /// Whether this anchor needs font metrics to resolve.
    pub fn is_baseline(self) -> bool {
        self.split().1 == Vertical::Baseline
    }

    /// Convert a reference point into the top-left corner of a child of
    /// `size`.
    ///
    /// `ascender` is the distance from the top of the text box to its
    /// baseline. Returns `None` for a baseline anchor without an ascender.
    pub fn resolve(self, point: Point, size: Size, ascender: Option<i32>) -> Option<Point> {
        let (horizontal, vertical) = self.split();
        let width = size.width as i32;
        let height = size.height as i32;

        let x = match horizontal {
            Horizontal::Left => point.x,
            Horizontal::Center => point.x - width / 2,
            Horizontal::Right => point.x - width,
        };
        let y = match vertical {
            Vertical::Top => point.y,
            Vertical::Center => point.y - height / 2,
            Vertical::Bottom => point.y - height,
            Vertical::Baseline => point.y - ascender?,
        };

        Some(Point::new(x, y))
    }
}
