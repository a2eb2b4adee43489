//! Visible window of the play queue.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

use super::format::fit_text;
use super::place;
use crate::model::PlayerModel;
use crate::ui::Anchor;
use crate::ui::colors::{COLOR_CURSOR_ROW, COLOR_TEXT_PRIMARY, COLOR_TEXT_SECONDARY};
use crate::widget::{FontHandle, WidgetId, WidgetKind, WidgetResult, WidgetTree};

/// Queue positions shown in a window of `slots` rows centred on `cursor`.
///
/// There is always one entry per slot. Positions outside `0..len` are
/// `None` and rendered as empty rows.
pub fn queue_window(cursor: usize, len: usize, slots: usize) -> Vec<Option<usize>> {
    let first = cursor as isize - (slots / 2) as isize;
    (0..slots as isize)
        .map(|row| first + row)
        .map(|position| {
            usize::try_from(position)
                .ok()
                .filter(|position| *position < len)
        })
        .collect()
}

/// Rebuild the queue rows inside `section`.
///
/// Each row is a container of `row_size`; the cursor row is highlighted.
pub fn render_queue(
    tree: &WidgetTree,
    section: WidgetId,
    model: &dyn PlayerModel,
    font: FontHandle,
    slots: usize,
    row_size: Size,
) -> WidgetResult<()> {
    tree.container_clear(section)?;

    let cursor = model.queue_position();
    let window = queue_window(cursor.unwrap_or(0), model.queue_len(), slots);
    for (row, position) in window.into_iter().enumerate() {
        let row_id = tree.create(WidgetKind::Container, row_size)?;
        let mut label = None;
        if let Some(position) = position {
            let is_cursor = Some(position) == cursor;
            if is_cursor {
                tree.set_background(row_id, Some(COLOR_CURSOR_ROW))?;
            }
            if let Some(item) = model.queue_item(position) {
                let text = format!("{}. {} - {}", position + 1, item.title, item.artist);
                let color = if is_cursor {
                    COLOR_TEXT_PRIMARY
                } else {
                    COLOR_TEXT_SECONDARY
                };
                label = Some((fit_text(&text, font, row_size.width.saturating_sub(8)), color));
            }
        }

        let y = (row as u32 * row_size.height) as i32;
        place(tree, section, row_id, Point::new(0, y), Anchor::TopLeft)?;
        if let Some((text, color)) = label {
            add_row_text(tree, row_id, &text, font, color, row_size)?;
        }
    }
    Ok(())
}

fn add_row_text(
    tree: &WidgetTree,
    row: WidgetId,
    text: &str,
    font: FontHandle,
    color: Rgb565,
    row_size: Size,
) -> WidgetResult<()> {
    let id = tree.create_text(text, font, color)?;
    let center_y = (row_size.height / 2) as i32;
    place(tree, row, id, Point::new(4, center_y), Anchor::Left)
}
