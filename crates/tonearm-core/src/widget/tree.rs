//! Widget arena, lifecycle and container composition.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use log::{debug, error, warn};

use super::image::ImagePayload;
use super::node::{Payload, WidgetNode};
use super::text::{FontHandle, TextPayload};
use super::{WidgetError, WidgetId, WidgetKind, WidgetResult};
use crate::surface::{FrameBuffer, NodeSurface, Surface};
use crate::ui::Anchor;

/// Log a consistency violation and hand the error back to the caller.
fn violation(err: WidgetError) -> WidgetError {
    error!("Widget consistency violation: {}", err);
    err
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Arc<WidgetNode>>,
}

#[derive(Debug, Default)]
struct Slots {
    entries: Vec<Slot>,
    free_list: Vec<u32>,
    root: Option<WidgetId>,
}

/// Arena of widgets addressed by [`WidgetId`].
///
/// The arena lock is only held for the lookup of a node; every node then has
/// its own lock guarding its children, dirty flag, background, offset, name
/// and payload. Traversals copy a container's child list before descending,
/// so no two node locks are ever held at once.
#[derive(Debug, Default)]
pub struct WidgetTree {
    slots: RwLock<Slots>,
}

impl WidgetTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slots_mut(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a live node.
    pub(crate) fn node(&self, id: WidgetId) -> WidgetResult<Arc<WidgetNode>> {
        self.slots()
            .entries
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.clone())
            .ok_or(WidgetError::StaleHandle(id))
    }

    fn insert(&self, node: WidgetNode) -> WidgetId {
        let node = Some(Arc::new(node));
        let mut slots = self.slots_mut();
        if let Some(idx) = slots.free_list.pop() {
            let slot = &mut slots.entries[idx as usize];
            slot.node = node;
            WidgetId {
                idx,
                generation: slot.generation,
            }
        } else {
            let idx = slots.entries.len() as u32;
            slots.entries.push(Slot {
                generation: 0,
                node,
            });
            WidgetId { idx, generation: 0 }
        }
    }

    /// Free a slot. Bumping the generation makes old handles fail lookup.
    fn free(&self, id: WidgetId) {
        let mut slots = self.slots_mut();
        if let Some(slot) = slots.entries.get_mut(id.idx as usize) {
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            slots.free_list.push(id.idx);
        }
        if slots.root == Some(id) {
            slots.root = None;
        }
    }

    /// Whether the handle refers to a live widget.
    pub fn is_alive(&self, id: WidgetId) -> bool {
        match self.node(id) {
            Ok(node) => !node.state().destroyed,
            Err(_) => false,
        }
    }

    /// Number of live widgets.
    pub fn len(&self) -> usize {
        self.slots()
            .entries
            .iter()
            .filter(|slot| slot.node.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The root widget, if one was created.
    pub fn root(&self) -> Option<WidgetId> {
        self.slots().root
    }

    // -- Lifecycle --

    /// Create a widget with reference count 1, marked dirty.
    ///
    /// Text widgets start with an empty string in the default font and image
    /// widgets with no source; see [`create_text`](Self::create_text) and
    /// [`create_image`](Self::create_image) for the usual constructors.
    pub fn create(&self, kind: WidgetKind, size: Size) -> WidgetResult<WidgetId> {
        let payload = match kind {
            WidgetKind::Root => return Err(WidgetError::RootViaCreate),
            WidgetKind::Container => Payload::None,
            WidgetKind::Text => Payload::Text(TextPayload::new(
                String::new(),
                FontHandle::default(),
                Rgb565::WHITE,
            )),
            WidgetKind::Image => Payload::Image(ImagePayload::new(String::new())),
        };
        self.create_with(kind, size, payload)
    }

    pub(crate) fn create_with(
        &self,
        kind: WidgetKind,
        size: Size,
        payload: Payload,
    ) -> WidgetResult<WidgetId> {
        let surface = Surface::try_new(size)
            .inspect_err(|err| error!("Widget creation failed: {}", err))?;
        let id = self.insert(WidgetNode::new(
            kind,
            size,
            NodeSurface::Offscreen(surface),
            payload,
        ));
        debug!("Created {:?} {:?} of {}x{}", kind, id, size.width, size.height);
        Ok(id)
    }

    /// Create the root widget, which owns the presentation framebuffer.
    ///
    /// There is exactly one root per tree.
    pub fn create_root(&self, size: Size) -> WidgetResult<WidgetId> {
        if self.root().is_some() {
            return Err(violation(WidgetError::RootExists));
        }
        let framebuffer = FrameBuffer::try_new(size)?;
        let node = WidgetNode::new(
            WidgetKind::Root,
            size,
            NodeSurface::Presentation(framebuffer),
            Payload::None,
        );
        node.state().background = Some(Rgb565::BLACK);

        let id = self.insert(node);
        let mut slots = self.slots_mut();
        if slots.root.is_some() {
            drop(slots);
            self.free(id);
            return Err(violation(WidgetError::RootExists));
        }
        slots.root = Some(id);
        debug!("Created root {:?} of {}x{}", id, size.width, size.height);
        Ok(id)
    }

    /// Take an additional reference to a widget.
    pub fn retain(&self, id: WidgetId) -> WidgetResult<()> {
        let node = self.node(id)?;
        let mut state = node.state();
        if state.destroyed {
            return Err(violation(WidgetError::StaleHandle(id)));
        }
        state.ref_count += 1;
        Ok(())
    }

    /// Drop one reference to a widget.
    ///
    /// Returns `true` when this was the last reference and the widget was
    /// destroyed. Destroying a container that still owns children is a
    /// consistency violation: it is logged and the children keep the
    /// references it held.
    pub fn release(&self, id: WidgetId) -> WidgetResult<bool> {
        let node = self.node(id)?;
        let mut state = node.state();
        if state.destroyed {
            return Err(violation(WidgetError::StaleHandle(id)));
        }

        state.ref_count -= 1;
        if state.ref_count > 0 {
            return Ok(false);
        }

        if !state.children.is_empty() {
            error!(
                "Destroying widget {:?} '{}' that still owns {} children",
                id,
                state.name,
                state.children.len()
            );
        }
        state.destroyed = true;
        let payload = core::mem::take(&mut state.payload);
        drop(state);
        drop(payload);

        self.free(id);
        debug!("Destroyed {:?} {:?}", node.kind, id);
        Ok(true)
    }

    // -- Composition --

    /// Append `child` to `parent`, placing it so that its `anchor` point lands
    /// on `point` (in parent coordinates).
    ///
    /// The resolved top-left corner is stored as the child's offset, the child
    /// gains a reference and the parent is marked dirty. The child itself is
    /// *not* marked dirty: re-adding a widget that was drawn before keeps its
    /// old pixels unless the caller calls [`mark_dirty`](Self::mark_dirty).
    ///
    /// A widget stores a single offset, so adding it to a second container
    /// moves it in the first one as well.
    pub fn container_add(
        &self,
        parent: WidgetId,
        child: WidgetId,
        point: Point,
        anchor: Anchor,
    ) -> WidgetResult<()> {
        let parent_node = self.node(parent)?;
        if !parent_node.kind.is_container() {
            return Err(violation(WidgetError::NotAContainer(parent)));
        }
        let child_node = self.node(child)?;
        if child == parent || self.has_descendant(child, parent) {
            return Err(violation(WidgetError::Cycle { parent, child }));
        }

        let ascender = if anchor.is_baseline() {
            match &child_node.state().payload {
                Payload::Text(text) => Some(text.font.ascender()),
                _ => return Err(violation(WidgetError::BaselineRequiresText(child))),
            }
        } else {
            None
        };
        let offset = anchor
            .resolve(point, child_node.size, ascender)
            .ok_or(WidgetError::BaselineRequiresText(child))?;

        {
            let mut state = parent_node.state();
            if state.destroyed {
                return Err(violation(WidgetError::StaleHandle(parent)));
            }
            if state.children.contains(&child) {
                return Err(violation(WidgetError::AlreadyPresent { parent, child }));
            }
            state.children.push(child);
            state.dirty = true;
        }

        let mut state = child_node.state();
        if state.destroyed {
            drop(state);
            parent_node.state().children.retain(|id| *id != child);
            return Err(violation(WidgetError::StaleHandle(child)));
        }
        state.ref_count += 1;
        state.offset = offset;

        debug!(
            "Added {:?} to {:?} at ({}, {})",
            child, parent, offset.x, offset.y
        );
        Ok(())
    }

    /// Unlink `child` from `parent` and release the container's reference to
    /// it, or with `None` unlink and release every child.
    pub fn container_remove(&self, parent: WidgetId, child: Option<WidgetId>) -> WidgetResult<()> {
        let parent_node = self.node(parent)?;
        let removed = {
            let mut state = parent_node.state();
            match child {
                None => {
                    state.dirty = true;
                    core::mem::take(&mut state.children)
                }
                Some(child) => {
                    let Some(pos) = state.children.iter().position(|id| *id == child) else {
                        return Err(violation(WidgetError::NotPresent { parent, child }));
                    };
                    state.children.remove(pos);
                    state.dirty = true;
                    vec![child]
                }
            }
        };

        let mut first_err = None;
        for id in removed {
            if let Err(err) = self.release(id) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Remove every child of `parent`, emptying each child container whose
    /// last reference was held by `parent` before releasing it.
    pub fn container_clear(&self, parent: WidgetId) -> WidgetResult<()> {
        let parent_node = self.node(parent)?;
        let removed = {
            let mut state = parent_node.state();
            state.dirty = true;
            core::mem::take(&mut state.children)
        };

        let mut first_err = None;
        for id in removed {
            if let Err(err) = self.release_cascading(id) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn release_cascading(&self, id: WidgetId) -> WidgetResult<()> {
        let node = self.node(id)?;
        let last_reference = node.state().ref_count == 1;
        let cleared = if last_reference && node.kind.is_container() {
            self.container_clear(id)
        } else {
            Ok(())
        };
        self.release(id)?;
        cleared
    }

    /// Whether `target` is reachable from `ancestor` through child lists.
    fn has_descendant(&self, ancestor: WidgetId, target: WidgetId) -> bool {
        let mut stack = self.children(ancestor).unwrap_or_default();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if let Ok(children) = self.children(id) {
                stack.extend(children);
            }
        }
        false
    }

    // -- Dirty tracking --

    /// Force `id` dirty, forcing a repaint on the next redraw.
    pub fn mark_dirty(&self, id: WidgetId) -> WidgetResult<()> {
        self.node(id)?.state().dirty = true;
        Ok(())
    }

    /// Mark `id` and every descendant dirty (full redraw).
    pub fn propagate_force_dirty(&self, id: WidgetId) -> WidgetResult<()> {
        let node = self.node(id)?;
        let children = {
            let mut state = node.state();
            state.dirty = true;
            state.children.clone()
        };
        for child in children {
            if let Err(err) = self.propagate_force_dirty(child) {
                warn!("Skipping {:?} while forcing dirty: {}", child, err);
            }
        }
        Ok(())
    }

    /// Fold child dirtiness into each ancestor, bottom-up.
    ///
    /// Children keep their own flags so the redraw pass still repaints them.
    /// Returns whether anything in the subtree needs a redraw.
    pub fn aggregate_dirty(&self, id: WidgetId) -> WidgetResult<bool> {
        let node = self.node(id)?;
        let children = node.state().children.clone();

        let mut any_child = false;
        for child in children {
            match self.aggregate_dirty(child) {
                Ok(dirty) => any_child |= dirty,
                Err(err) => warn!("Skipping {:?} while aggregating dirty state: {}", child, err),
            }
        }

        let mut state = node.state();
        state.dirty |= any_child;
        Ok(state.dirty)
    }

    // -- Properties --

    pub fn kind(&self, id: WidgetId) -> WidgetResult<WidgetKind> {
        Ok(self.node(id)?.kind)
    }

    pub fn size(&self, id: WidgetId) -> WidgetResult<Size> {
        Ok(self.node(id)?.size)
    }

    /// Top-left corner inside the parent, as resolved at insertion.
    pub fn offset(&self, id: WidgetId) -> WidgetResult<Point> {
        Ok(self.node(id)?.state().offset)
    }

    pub fn ref_count(&self, id: WidgetId) -> WidgetResult<u32> {
        Ok(self.node(id)?.state().ref_count)
    }

    pub fn is_dirty(&self, id: WidgetId) -> WidgetResult<bool> {
        Ok(self.node(id)?.state().dirty)
    }

    /// Snapshot of the child list, in paint order.
    pub fn children(&self, id: WidgetId) -> WidgetResult<Vec<WidgetId>> {
        Ok(self.node(id)?.state().children.clone())
    }

    pub fn background(&self, id: WidgetId) -> WidgetResult<Option<Rgb565>> {
        Ok(self.node(id)?.state().background)
    }

    /// Set the flat background color; `None` leaves the widget transparent.
    pub fn set_background(&self, id: WidgetId, background: Option<Rgb565>) -> WidgetResult<()> {
        let node = self.node(id)?;
        let mut state = node.state();
        if state.background != background {
            state.background = background;
            state.dirty = true;
        }
        Ok(())
    }

    pub fn name(&self, id: WidgetId) -> WidgetResult<String> {
        Ok(self.node(id)?.state().name.as_str().into())
    }

    /// Set the diagnostic name used in logs, truncated to
    /// [`MAX_NAME_LEN`](super::MAX_NAME_LEN) bytes.
    pub fn set_name(&self, id: WidgetId, name: &str) -> WidgetResult<()> {
        let node = self.node(id)?;
        let mut state = node.state();
        state.name.clear();
        for c in name.chars() {
            if state.name.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Run `f` on the root's presentation framebuffer.
    pub fn with_framebuffer<R>(
        &self,
        root: WidgetId,
        f: impl FnOnce(&mut FrameBuffer) -> R,
    ) -> WidgetResult<R> {
        let node = self.node(root)?;
        let mut surface = node.surface();
        match &mut *surface {
            NodeSurface::Presentation(framebuffer) => Ok(f(framebuffer)),
            NodeSurface::Offscreen(_) => Err(WidgetError::WrongKind {
                id: root,
                expected: WidgetKind::Root,
                found: node.kind,
            }),
        }
    }

    /// Run `f` on an off-screen widget surface.
    pub fn with_surface<R>(&self, id: WidgetId, f: impl FnOnce(&Surface) -> R) -> WidgetResult<R> {
        let node = self.node(id)?;
        let surface = node.surface();
        match &*surface {
            NodeSurface::Offscreen(surface) => Ok(f(surface)),
            NodeSurface::Presentation(_) => Err(WidgetError::WrongKind {
                id,
                expected: WidgetKind::Container,
                found: node.kind,
            }),
        }
    }
}
