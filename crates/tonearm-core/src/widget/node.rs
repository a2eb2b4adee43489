//! Widget node storage.

use std::sync::{Mutex, MutexGuard, PoisonError};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use super::image::ImagePayload;
use super::text::TextPayload;
use super::{MAX_NAME_LEN, WidgetId, WidgetKind};
use crate::surface::NodeSurface;

/// Kind-specific content of a widget.
#[derive(Debug, Default)]
pub(crate) enum Payload {
    #[default]
    None,
    Text(TextPayload),
    Image(ImagePayload),
}

/// Mutable fields of a node, guarded by the node's own lock.
#[derive(Debug)]
pub(crate) struct NodeState {
    pub(crate) ref_count: u32,
    pub(crate) dirty: bool,
    pub(crate) offset: Point,
    pub(crate) background: Option<Rgb565>,
    pub(crate) children: Vec<WidgetId>,
    pub(crate) name: heapless::String<MAX_NAME_LEN>,
    pub(crate) payload: Payload,
    /// Set once the count reached zero; racing lookups must not revive it.
    pub(crate) destroyed: bool,
}

/// A single widget. `kind` and `size` never change after creation.
#[derive(Debug)]
pub(crate) struct WidgetNode {
    pub(crate) kind: WidgetKind,
    pub(crate) size: Size,
    state: Mutex<NodeState>,
    /// Only locked by the compositor thread.
    surface: Mutex<NodeSurface>,
}

impl WidgetNode {
    pub(crate) fn new(
        kind: WidgetKind,
        size: Size,
        surface: NodeSurface,
        payload: Payload,
    ) -> Self {
        Self {
            kind,
            size,
            state: Mutex::new(NodeState {
                ref_count: 1,
                dirty: true,
                offset: Point::zero(),
                background: None,
                children: Vec::new(),
                name: heapless::String::new(),
                payload,
                destroyed: false,
            }),
            surface: Mutex::new(surface),
        }
    }

    /// Lock the node state. A poisoned lock is recovered: the fields are
    /// plain data and stay consistent between statements.
    pub(crate) fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn surface(&self) -> MutexGuard<'_, NodeSurface> {
        self.surface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
