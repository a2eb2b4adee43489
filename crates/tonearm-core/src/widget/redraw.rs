//! Two-phase redraw: repaint dirty widgets, composite every widget onto its
//! parent.

use log::{debug, warn};

use super::node::{Payload, WidgetNode};
use super::{WidgetId, WidgetKind, WidgetResult, WidgetTree};
use crate::surface::NodeSurface;

/// Work done by one [`WidgetTree::redraw`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedrawStats {
    /// Widgets whose surface was cleared and repainted.
    pub painted: usize,
    /// Child surfaces blitted onto a parent surface.
    pub composited: usize,
}

impl WidgetTree {
    /// Redraw the subtree rooted at `id`.
    ///
    /// A dirty widget is cleared to its background and repainted: containers
    /// recurse into their children in paint order, text and images paint
    /// their payload. Every child, dirty or not, is then blitted onto its
    /// parent at its offset, so a clean subtree still shows up in a freshly
    /// repainted ancestor.
    ///
    /// When painting a widget fails the error is logged and returned, the
    /// widget and every ancestor stay dirty, and siblings are still drawn.
    pub fn redraw(&self, id: WidgetId) -> WidgetResult<RedrawStats> {
        let mut stats = RedrawStats::default();
        self.redraw_node(id, None, &mut stats)?;
        debug!(
            "Redraw of {:?}: {} painted, {} composited",
            id, stats.painted, stats.composited
        );
        Ok(stats)
    }

    fn redraw_node(
        &self,
        id: WidgetId,
        parent: Option<&mut NodeSurface>,
        stats: &mut RedrawStats,
    ) -> WidgetResult<()> {
        let node = self.node(id)?;
        let mut surface = node.surface();
        let (dirty, background, offset) = {
            let state = node.state();
            (state.dirty, state.background, state.offset)
        };

        let mut painted = Ok(());
        if dirty {
            surface.reset(background);
            stats.painted += 1;
            painted = self.paint_content(id, &node, &mut surface, stats);
            if painted.is_ok() {
                node.state().dirty = false;
            }
        }

        // Composited even when painting failed.
        if let Some(parent) = parent
            && let NodeSurface::Offscreen(own) = &*surface
        {
            let Ok(()) = own.blit_onto(parent, offset);
            stats.composited += 1;
        }
        painted
    }

    fn paint_content(
        &self,
        id: WidgetId,
        node: &WidgetNode,
        surface: &mut NodeSurface,
        stats: &mut RedrawStats,
    ) -> WidgetResult<()> {
        match node.kind {
            WidgetKind::Root | WidgetKind::Container => {
                let children = node.state().children.clone();
                let mut first_err = None;
                for child in children {
                    if let Err(err) = self.redraw_node(child, Some(&mut *surface), stats) {
                        first_err.get_or_insert(err);
                    }
                }
                first_err.map_or(Ok(()), Err)
            }
            WidgetKind::Text | WidgetKind::Image => {
                let state = node.state();
                let result = match &state.payload {
                    Payload::Text(text) => {
                        text.paint(surface);
                        Ok(())
                    }
                    Payload::Image(image) => image.paint(id, node.size, surface),
                    Payload::None => Ok(()),
                };
                if let Err(err) = &result {
                    warn!(
                        "Painting {:?} '{}' failed, retrying next frame: {}",
                        id, state.name, err
                    );
                }
                result
            }
        }
    }
}
