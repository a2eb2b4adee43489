//! Now-playing screen: header, artwork, track details, status line,
//! position and the queue window.

use core::time::Duration;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::debug;

use super::format::{fit_text, position_string, slider_fill, volume_label};
use super::place;
use super::queue::render_queue;
use crate::compositor::{CategoryRenderer, RenderContext};
use crate::model::{ArtworkState, QueueItem};
use crate::scheduler::Category;
use crate::ui::Anchor;
use crate::ui::colors::*;
use crate::widget::{FontHandle, WidgetId, WidgetKind, WidgetResult, WidgetTree};

/// Requested categories after which the position is read back from the
/// model instead of extrapolated.
const RESYNC: Category = Category::SCREEN
    .union(Category::CURRENT_ITEM)
    .union(Category::PLAYBACK_STATE)
    .union(Category::POSITION);

const PADDING: u32 = 8;
const HEADER_HEIGHT: u32 = 16;
const LINE_HEIGHT: u32 = 12;
const SLIDER_HEIGHT: u32 = 4;

// ---------------------------------------------------------------------------
// Position clock
// ---------------------------------------------------------------------------

/// Play position extrapolated between model reads.
///
/// The model's seek position is only read when a producer flagged a
/// relevant change; in between, the position advances by the time that
/// passed between compositor iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionClock {
    position: Duration,
}

impl PositionClock {
    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn sync(&mut self, position: Duration) {
        self.position = position;
    }

    pub fn advance(&mut self, elapsed: Duration) {
        self.position = self.position.saturating_add(elapsed);
    }

    /// Never run past the end of the item.
    pub fn clamp(&mut self, total: Duration) {
        self.position = self.position.min(total);
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Section rectangles, derived once per screen build from the panel size.
#[derive(Debug, Clone, Copy)]
struct Layout {
    header: Rectangle,
    artwork: Rectangle,
    track: Rectangle,
    state: Rectangle,
    mode: Rectangle,
    volume: Rectangle,
    format: Rectangle,
    position: Rectangle,
    slider: Rectangle,
    queue: Rectangle,
    row_height: u32,
}

impl Layout {
    fn new(size: Size, slots: u8) -> Self {
        let (width, height) = (size.width, size.height);
        let rect = |x: u32, y: u32, w: u32, h: u32| {
            Rectangle::new(Point::new(x as i32, y as i32), Size::new(w, h))
        };

        let art_top = HEADER_HEIGHT + PADDING;
        let art_side = (height * 2 / 5).min(width / 3);
        let info_x = PADDING * 2 + art_side;
        let info_w = width.saturating_sub(info_x + PADDING);
        let half = info_w / 2;

        let position_y = art_top + art_side + 4;
        let slider_y = position_y + LINE_HEIGHT + 4;
        let queue_y = slider_y + SLIDER_HEIGHT + 4;
        let queue_h = height.saturating_sub(queue_y);
        let content_w = width.saturating_sub(PADDING * 2);

        Self {
            header: rect(0, 0, width, HEADER_HEIGHT),
            artwork: rect(PADDING, art_top, art_side, art_side),
            track: rect(info_x, art_top, info_w, 48),
            state: rect(info_x, art_top + 52, half, LINE_HEIGHT),
            mode: rect(info_x + half, art_top + 52, info_w - half, LINE_HEIGHT),
            volume: rect(info_x, art_top + 68, half, LINE_HEIGHT),
            format: rect(info_x + half, art_top + 68, info_w - half, LINE_HEIGHT),
            position: rect(PADDING, position_y, content_w, LINE_HEIGHT),
            slider: rect(PADDING, slider_y, content_w, SLIDER_HEIGHT),
            queue: rect(0, queue_y, width, queue_h),
            row_height: queue_h / u32::from(slots.max(1)),
        }
    }
}

/// Handles of the section containers. The root owns them; the screen only
/// borrows the ids.
#[derive(Debug, Clone, Copy)]
struct Sections {
    header: WidgetId,
    artwork: WidgetId,
    track: WidgetId,
    state: WidgetId,
    mode: WidgetId,
    volume: WidgetId,
    format: WidgetId,
    position: WidgetId,
    position_text: WidgetId,
    slider: WidgetId,
    queue: WidgetId,
    row_size: Size,
}

// ---------------------------------------------------------------------------
// Screen
// ---------------------------------------------------------------------------

/// The production screen of the player.
#[derive(Debug, Default)]
pub struct NowPlayingScreen {
    sections: Option<Sections>,
    clock: PositionClock,
    clock_frame: Option<u64>,
    duration: Option<Duration>,
    slider_fill: Option<u32>,
}

impl NowPlayingScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current extrapolated play position.
    pub fn position(&self) -> Duration {
        self.clock.position()
    }

    fn build(&mut self, ctx: &mut RenderContext<'_>) -> WidgetResult<()> {
        let tree = ctx.tree;
        tree.container_clear(ctx.root)?;
        self.sections = None;
        self.slider_fill = None;

        let layout = Layout::new(ctx.config.size(), ctx.config.queue_slots);
        let section = |rect: Rectangle, name: &str, background: Option<Rgb565>| {
            let id = tree.create(WidgetKind::Container, rect.size)?;
            tree.set_name(id, name)?;
            tree.set_background(id, background)?;
            place(tree, ctx.root, id, rect.top_left, Anchor::TopLeft)?;
            Ok::<_, crate::widget::WidgetError>(id)
        };

        let header = section(layout.header, "header", Some(COLOR_HEADER))?;
        let artwork = section(layout.artwork, "artwork", Some(COLOR_STROKE))?;
        let track = section(layout.track, "track", None)?;
        let state = section(layout.state, "state", None)?;
        let mode = section(layout.mode, "mode", None)?;
        let volume = section(layout.volume, "volume", None)?;
        let format = section(layout.format, "format", None)?;
        let position = section(layout.position, "position", None)?;
        let slider = section(layout.slider, "slider", Some(COLOR_STROKE))?;
        let queue = section(layout.queue, "queue", None)?;

        let font = ctx.fonts.small;
        let text_size = Size::new(layout.position.size.width, font.line_height());
        let position_text = tree.create_text_sized(text_size, "", font, COLOR_TEXT_SECONDARY)?;
        tree.set_name(position_text, "position-text")?;
        let center = Point::new(0, (LINE_HEIGHT / 2) as i32);
        place(tree, position, position_text, center, Anchor::Left)?;

        debug!("Built now-playing screen with {} widgets", tree.len());
        self.sections = Some(Sections {
            header,
            artwork,
            track,
            state,
            mode,
            volume,
            format,
            position,
            position_text,
            slider,
            queue,
            row_size: Size::new(layout.queue.size.width, layout.row_height),
        });
        Ok(())
    }

    fn render_header(&self, s: &Sections, ctx: &RenderContext<'_>) -> WidgetResult<()> {
        let tree = ctx.tree;
        let device = ctx.model.device();
        let size = tree.size(s.header)?;
        let center_y = (size.height / 2) as i32;
        tree.container_clear(s.header)?;

        let (status, color) = if device.registered {
            ("Registered", COLOR_ACCENT)
        } else {
            ("Not registered", COLOR_TEXT_MUTED)
        };
        let font = ctx.fonts.small;
        let status_w = font.measure(status).width;
        let name = fit_text(&device.name, font, size.width.saturating_sub(status_w + 12));
        add_text(
            tree,
            s.header,
            &name,
            font,
            COLOR_TEXT_PRIMARY,
            Point::new(4, center_y),
            Anchor::Left,
        )?;
        add_text(
            tree,
            s.header,
            status,
            font,
            color,
            Point::new(size.width as i32 - 4, center_y),
            Anchor::Right,
        )
    }

    fn render_current_item(&mut self, s: &Sections, ctx: &RenderContext<'_>) -> WidgetResult<()> {
        let tree = ctx.tree;
        let item = ctx.model.current_item();
        self.duration = item.as_ref().and_then(|item| item.duration);

        tree.container_clear(s.track)?;
        let width = tree.size(s.track)?.width;
        let fonts = ctx.fonts;
        match &item {
            Some(item) => {
                let title = fit_text(&item.title, fonts.regular, width);
                let artist = fit_text(&item.artist, fonts.small, width);
                let album = fit_text(&item.album, fonts.small, width);
                let lines = [
                    (title, fonts.regular, COLOR_TEXT_PRIMARY, 0),
                    (artist, fonts.small, COLOR_TEXT_SECONDARY, 18),
                    (album, fonts.small, COLOR_TEXT_MUTED, 32),
                ];
                for (text, font, color, y) in lines {
                    add_text(tree, s.track, &text, font, color, Point::new(0, y), Anchor::TopLeft)?;
                }
            }
            None => {
                add_text(
                    tree,
                    s.track,
                    "Nothing playing",
                    fonts.regular,
                    COLOR_TEXT_MUTED,
                    Point::zero(),
                    Anchor::TopLeft,
                )?;
            }
        }

        self.render_artwork(s.artwork, item.as_ref(), ctx)
    }

    fn render_artwork(
        &self,
        section: WidgetId,
        item: Option<&QueueItem>,
        ctx: &RenderContext<'_>,
    ) -> WidgetResult<()> {
        let tree = ctx.tree;
        tree.container_clear(section)?;

        let Some(uri) = item.and_then(|item| item.artwork_uri.as_deref()) else {
            return Ok(());
        };
        let Some(url) = ctx.model.resolve_uri(uri) else {
            debug!("Artwork URI '{}' does not resolve", uri);
            return Ok(());
        };

        let size = tree.size(section)?;
        let image = tree.create_image(size, &url)?;
        tree.set_name(image, "artwork-image")?;
        place(tree, section, image, Point::zero(), Anchor::TopLeft)?;
        match ctx.model.artwork(&url, size) {
            ArtworkState::Ready(pixels) => tree.set_image_pixels(image, pixels),
            ArtworkState::Pending => Ok(()),
            ArtworkState::Unavailable => tree.mark_image_failed(image),
        }
    }

    /// Bring the clock up to date, at most once per frame.
    fn update_clock(&mut self, ctx: &RenderContext<'_>) -> Duration {
        if self.clock_frame != Some(ctx.frame) {
            self.clock_frame = Some(ctx.frame);
            if ctx.requested.intersects(RESYNC) || !ctx.model.playback_state().is_progressing() {
                self.clock.sync(ctx.model.seek_position());
            } else {
                self.clock.advance(ctx.elapsed);
            }
            if let Some(total) = self.duration {
                self.clock.clamp(total);
            }
        }
        self.clock.position()
    }

    fn render_slider(&mut self, s: &Sections, ctx: &RenderContext<'_>) -> WidgetResult<()> {
        let position = self.update_clock(ctx);
        let size = ctx.tree.size(s.slider)?;
        let fill = slider_fill(size.width, position, self.duration);
        if self.slider_fill == Some(fill) {
            return Ok(());
        }

        ctx.tree.container_clear(s.slider)?;
        if fill > 0 {
            let bar = ctx
                .tree
                .create(WidgetKind::Container, Size::new(fill, size.height))?;
            ctx.tree.set_background(bar, Some(COLOR_ACCENT))?;
            place(ctx.tree, s.slider, bar, Point::zero(), Anchor::TopLeft)?;
        }
        self.slider_fill = Some(fill);
        Ok(())
    }
}

impl CategoryRenderer for NowPlayingScreen {
    fn categories(&self) -> Category {
        Category::SCREEN | Category::CONTENT
    }

    fn render(&mut self, category: Category, ctx: &mut RenderContext<'_>) -> WidgetResult<()> {
        if category == Category::SCREEN {
            return self.build(ctx);
        }
        let Some(s) = self.sections else {
            debug!("Skipping {:?}: screen not built", category);
            return Ok(());
        };

        let tree = ctx.tree;
        let fonts = ctx.fonts;
        let model = ctx.model;
        match category {
            Category::CONFIGURATION => self.render_header(&s, ctx),
            Category::CURRENT_ITEM => self.render_current_item(&s, ctx),
            Category::QUEUE => render_queue(
                tree,
                s.queue,
                model,
                fonts.small,
                usize::from(ctx.config.queue_slots),
                s.row_size,
            ),
            Category::PLAYBACK_STATE => {
                let state = model.playback_state();
                let color = if state.is_progressing() {
                    COLOR_ACCENT
                } else {
                    COLOR_TEXT_MUTED
                };
                set_label(tree, s.state, state.label(), fonts.small, color)
            }
            Category::PLAYBACK_MODE => {
                let label = model.playback_mode().label();
                set_label(tree, s.mode, &label, fonts.small, COLOR_TEXT_SECONDARY)
            }
            Category::VOLUME => {
                let volume = model.volume();
                let color = if volume.muted {
                    COLOR_WARNING
                } else {
                    COLOR_TEXT_SECONDARY
                };
                set_label(tree, s.volume, &volume_label(volume), fonts.small, color)
            }
            Category::AUDIO_FORMAT => {
                let label = model
                    .audio_format()
                    .map(|format| format.to_string())
                    .unwrap_or_default();
                set_label(tree, s.format, &label, fonts.small, COLOR_TEXT_SECONDARY)
            }
            Category::POSITION_STRING => {
                let position = self.update_clock(ctx);
                let text = position_string(position, self.duration);
                tree.set_text(s.position_text, &text)
            }
            Category::POSITION_SLIDER => self.render_slider(&s, ctx),
            _ => Ok(()),
        }
    }
}

fn add_text(
    tree: &WidgetTree,
    parent: WidgetId,
    text: &str,
    font: FontHandle,
    color: Rgb565,
    point: Point,
    anchor: Anchor,
) -> WidgetResult<()> {
    let id = tree.create_text(text, font, color)?;
    place(tree, parent, id, point, anchor)
}

/// Replace the content of a one-line section with `text`, vertically
/// centred at the left edge.
fn set_label(
    tree: &WidgetTree,
    section: WidgetId,
    text: &str,
    font: FontHandle,
    color: Rgb565,
) -> WidgetResult<()> {
    tree.container_clear(section)?;
    if text.is_empty() {
        return Ok(());
    }
    let size = tree.size(section)?;
    let text = fit_text(text, font, size.width);
    let center = Point::new(0, (size.height / 2) as i32);
    add_text(tree, section, &text, font, color, center, Anchor::Left)
}
