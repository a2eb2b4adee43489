//! Retained-mode widget tree
//!
//! Widgets are rectangles with a fixed size, an offset inside their parent,
//! a flat background color and their own pixel surface. The tree is an arena
//! addressed by generation-checked [`WidgetId`] handles:
//!
//! - **Lifecycle**: every widget carries an explicit reference count. It is
//!   created at 1, gains one unit per container holding it and is destroyed
//!   exactly when the count drops to zero.
//! - **Composition**: containers own an ordered list of children. Paint order
//!   is insertion order, later children overpaint earlier ones.
//! - **Redraw**: a two-phase pass. [`WidgetTree::aggregate_dirty`] folds
//!   child dirtiness upwards, then [`WidgetTree::redraw`] repaints dirty
//!   subtrees and composites every child onto its parent.
//!
//! Only the compositor thread mutates the tree. Size and offset queries may
//! be issued from any thread.

mod image;
mod node;
mod redraw;
mod text;
mod tree;

use core::fmt;
use thiserror::Error;

use crate::surface::AllocError;

pub use image::DecodeState;
pub use redraw::RedrawStats;
pub use text::FontHandle;
pub use tree::WidgetTree;

/// Maximum length of a widget's diagnostic name.
pub const MAX_NAME_LEN: usize = 24;

/// A handle to a widget in a [`WidgetTree`].
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a widget is destroyed and the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl WidgetId {
    /// Returns the raw slot index (for diagnostics only).
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WidgetId({}@gen{})", self.idx, self.generation)
    }
}

/// What a widget is and how it paints itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    /// Top of the tree, owns the presentation framebuffer.
    Root,
    /// Paints its children in insertion order.
    Container,
    /// Renders a string with a mono font.
    Text,
    /// Blits decoded pixels.
    Image,
}

impl WidgetKind {
    /// Whether widgets of this kind can hold children.
    pub fn is_container(self) -> bool {
        matches!(self, WidgetKind::Root | WidgetKind::Container)
    }
}

/// Errors raised by widget tree operations and the redraw pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WidgetError {
    /// Surface allocation failed
    #[error("surface allocation failed: {0}")]
    SurfaceAlloc(#[from] AllocError),

    /// The handle refers to a destroyed widget
    #[error("stale widget handle {0:?}")]
    StaleHandle(WidgetId),

    /// The tree already has a root widget
    #[error("a root widget already exists")]
    RootExists,

    /// Roots are created with `create_root`, not `create`
    #[error("root widgets must be created with create_root")]
    RootViaCreate,

    /// The widget is not a root or container
    #[error("widget {0:?} cannot hold children")]
    NotAContainer(WidgetId),

    /// The operation needs a widget of another kind
    #[error("widget {id:?} is a {found:?}, expected {expected:?}")]
    WrongKind {
        id: WidgetId,
        expected: WidgetKind,
        found: WidgetKind,
    },

    /// The exact widget instance is already a child of the container
    #[error("widget {child:?} is already a child of {parent:?}")]
    AlreadyPresent { parent: WidgetId, child: WidgetId },

    /// The widget is not a child of the container
    #[error("widget {child:?} is not a child of {parent:?}")]
    NotPresent { parent: WidgetId, child: WidgetId },

    /// Adding the child would make a widget its own ancestor
    #[error("adding {child:?} to {parent:?} would create a cycle")]
    Cycle { parent: WidgetId, child: WidgetId },

    /// Baseline anchors only apply to text widgets
    #[error("baseline anchor used for non-text widget {0:?}")]
    BaselineRequiresText(WidgetId),

    /// Decoded image pixels do not cover the widget
    #[error("image {id:?} has {actual} pixels, expected {expected}")]
    ImageSize {
        id: WidgetId,
        expected: usize,
        actual: usize,
    },
}

/// Result type for widget operations
pub type WidgetResult<T> = Result<T, WidgetError>;
