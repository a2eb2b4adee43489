//! Player screens built on the widget tree.
//!
//! A screen is a [`CategoryRenderer`](crate::compositor::CategoryRenderer):
//! on [`Category::SCREEN`](crate::scheduler::Category::SCREEN) it builds one
//! container per section under the root, and each content category then
//! rebuilds or updates only the section it owns.

pub mod format;
mod now_playing;
mod queue;

pub use now_playing::{NowPlayingScreen, PositionClock};
pub use queue::{queue_window, render_queue};

use embedded_graphics::prelude::*;

use crate::ui::Anchor;
use crate::widget::{WidgetId, WidgetResult, WidgetTree};

/// Add a freshly created `child` to `parent` and hand the creation
/// reference over to it, so that `parent` becomes the only owner.
///
/// The creation reference is dropped even when the add fails.
pub(crate) fn place(
    tree: &WidgetTree,
    parent: WidgetId,
    child: WidgetId,
    point: Point,
    anchor: Anchor,
) -> WidgetResult<()> {
    let added = tree.container_add(parent, child, point, anchor);
    tree.release(child)?;
    added
}
