//! Pixel surfaces owned by widgets.
//!
//! Every non-root widget draws into an off-screen [`Surface`] sized to the
//! widget, whose pixels may be transparent so that children overpaint only
//! what they cover. The root widget owns the [`FrameBuffer`] instead: an
//! opaque RAM copy of the panel with per-pixel change detection, so that
//! presenting a frame only sends the rectangle that actually changed.

use core::convert::Infallible;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::debug;
use thiserror::Error;

/// Pixel storage for a surface could not be allocated.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot allocate a {width}x{height} surface")]
pub struct AllocError {
    pub width: u32,
    pub height: u32,
}

/// Allocate `size.width * size.height` copies of `fill` without aborting on
/// allocation failure.
fn alloc_pixels<T: Clone>(size: Size, fill: T) -> Result<Vec<T>, AllocError> {
    let err = AllocError {
        width: size.width,
        height: size.height,
    };
    let len = (size.width as usize)
        .checked_mul(size.height as usize)
        .ok_or(err)?;

    let mut pixels = Vec::new();
    pixels.try_reserve_exact(len).map_err(|_| err)?;
    pixels.resize(len, fill);
    Ok(pixels)
}

/// Bounding box of pixels that have changed since the last flush.
#[derive(Debug, Clone, Copy)]
struct DirtyRect {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl DirtyRect {
    /// Expand the dirty region to include the given pixel coordinate.
    fn expand(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    /// Create a new dirty rect covering a single pixel.
    fn from_point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }
}

/// Presentation framebuffer implementing `DrawTarget<Color = Rgb565>`.
///
/// Tracks a dirty bounding box of writes and keeps a copy of what the panel
/// currently shows, so that only pixels that differ from the presented frame
/// are flushed to the hardware display.
#[derive(Debug)]
pub struct FrameBuffer {
    size: Size,
    pixels: Vec<Rgb565>,
    /// Contents of the panel after the last successful flush.
    shown: Vec<Rgb565>,
    dirty: Option<DirtyRect>,
    /// The panel content is unknown until the first flush.
    presented: bool,
}

impl FrameBuffer {
    /// Allocate a new framebuffer filled with black pixels.
    ///
    /// A fresh buffer counts as fully changed, so the first flush paints the
    /// whole panel.
    pub fn try_new(size: Size) -> Result<Self, AllocError> {
        let pixels = alloc_pixels(size, Rgb565::BLACK)?;
        let shown = alloc_pixels(size, Rgb565::BLACK)?;
        Ok(Self {
            size,
            pixels,
            shown,
            dirty: Self::full_rect(size),
            presented: false,
        })
    }

    fn full_rect(size: Size) -> Option<DirtyRect> {
        (size.width > 0 && size.height > 0).then(|| DirtyRect {
            min_x: 0,
            min_y: 0,
            max_x: size.width as usize - 1,
            max_y: size.height as usize - 1,
        })
    }

    /// Color of the pixel at `point`, if it lies inside the buffer.
    pub fn pixel(&self, point: Point) -> Option<Rgb565> {
        self.index(point).map(|idx| self.pixels[idx])
    }

    /// Whether any pixel was written with a new color since the last
    /// successful flush. The pixel may since have been restored.
    pub fn has_changes(&self) -> bool {
        self.dirty.is_some()
    }

    /// Shrink `rect` to the pixels that differ from the presented frame.
    fn changed_within(&self, rect: DirtyRect) -> Option<DirtyRect> {
        let stride = self.size.width as usize;
        let mut changed: Option<DirtyRect> = None;
        for y in rect.min_y..=rect.max_y {
            let row = y * stride;
            for x in rect.min_x..=rect.max_x {
                if self.pixels[row + x] != self.shown[row + x] {
                    match &mut changed {
                        Some(changed) => changed.expand(x, y),
                        None => changed = Some(DirtyRect::from_point(x, y)),
                    }
                }
            }
        }
        changed
    }

    fn index(&self, point: Point) -> Option<usize> {
        let (x, y) = (point.x, point.y);
        if x >= 0 && y >= 0 && (x as u32) < self.size.width && (y as u32) < self.size.height {
            Some(y as usize * self.size.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Write a single pixel, expanding the dirty rect only if the color changed.
    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb565) {
        let idx = y * self.size.width as usize + x;
        if self.pixels[idx] != color {
            self.pixels[idx] = color;
            match &mut self.dirty {
                Some(rect) => rect.expand(x, y),
                None => self.dirty = Some(DirtyRect::from_point(x, y)),
            }
        }
    }

    /// Flush the changed region to a hardware display, then reset the dirty
    /// state.
    ///
    /// Only the bounding rectangle of pixels that differ from the presented
    /// frame is sent via `fill_contiguous`; the first flush sends the whole
    /// buffer. If nothing changed, this is a no-op and returns `Ok(false)`.
    /// On error the dirty region is kept so the next flush retries it.
    pub fn flush<D>(&mut self, display: &mut D) -> Result<bool, D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let Some(dirty) = self.dirty else {
            return Ok(false);
        };
        let changed = if self.presented {
            self.changed_within(dirty)
        } else {
            Self::full_rect(self.size)
        };
        let Some(rect) = changed else {
            self.dirty = None;
            return Ok(false);
        };

        let width = rect.max_x - rect.min_x + 1;
        let height = rect.max_y - rect.min_y + 1;

        debug!(
            "Flushing {}x{} dirty region at ({}, {})",
            width, height, rect.min_x, rect.min_y
        );

        let area = Rectangle::new(
            Point::new(rect.min_x as i32, rect.min_y as i32),
            Size::new(width as u32, height as u32),
        );

        // Borrow the pixel slice so the closure captures a shared reference,
        // avoiding the `FnMut` escaping-reference issue with `&mut self`.
        let pixels = &self.pixels;
        let stride = self.size.width as usize;
        let pixel_iter = (rect.min_y..=rect.max_y).flat_map(move |y| {
            let row_start = y * stride + rect.min_x;
            pixels[row_start..row_start + width].iter().copied()
        });

        display.fill_contiguous(&area, pixel_iter)?;

        for y in rect.min_y..=rect.max_y {
            let row = y * stride + rect.min_x;
            self.shown[row..row + width].copy_from_slice(&self.pixels[row..row + width]);
        }
        self.dirty = None;
        self.presented = true;
        Ok(true)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = self.size.width as usize;
        let h = self.size.height as usize;

        for Pixel(coord, color) in pixels {
            let x = coord.x;
            let y = coord.y;
            if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let Some(bottom_right) = area.bottom_right() else {
            return Ok(());
        };

        for y in area.top_left.y..=bottom_right.y {
            for x in area.top_left.x..=bottom_right.x {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let w = self.size.width as usize;
        let h = self.size.height as usize;

        for y in 0..h {
            for x in 0..w {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }
}

/// Off-screen widget surface with per-pixel transparency.
///
/// `None` pixels are transparent and are skipped when the surface is blitted
/// onto its parent.
#[derive(Debug)]
pub struct Surface {
    size: Size,
    pixels: Vec<Option<Rgb565>>,
}

impl Surface {
    /// Allocate a fully transparent surface.
    pub fn try_new(size: Size) -> Result<Self, AllocError> {
        Ok(Self {
            size,
            pixels: alloc_pixels(size, None)?,
        })
    }

    /// Color of the pixel at `point`; `None` when transparent or outside.
    pub fn pixel(&self, point: Point) -> Option<Rgb565> {
        let (x, y) = (point.x, point.y);
        if x >= 0 && y >= 0 && (x as u32) < self.size.width && (y as u32) < self.size.height {
            self.pixels[y as usize * self.size.width as usize + x as usize]
        } else {
            None
        }
    }

    /// Fill the whole surface with `background`, or make it transparent.
    pub fn fill(&mut self, background: Option<Rgb565>) {
        self.pixels.fill(background);
    }

    /// Composite the opaque pixels of this surface onto `target`, with the
    /// surface's top-left corner at `offset`.
    pub fn blit_onto<D>(&self, target: &mut D, offset: Point) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let stride = self.size.width as usize;
        if stride == 0 {
            return Ok(());
        }
        let pixels = self.pixels.iter().enumerate().filter_map(|(idx, pixel)| {
            pixel.map(|color| {
                let x = offset.x + (idx % stride) as i32;
                let y = offset.y + (idx / stride) as i32;
                Pixel(Point::new(x, y), color)
            })
        });
        target.draw_iter(pixels)
    }
}

impl OriginDimensions for Surface {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for Surface {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = self.size.width as usize;
        let h = self.size.height as usize;

        for Pixel(coord, color) in pixels {
            let (x, y) = (coord.x, coord.y);
            if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
                self.pixels[y as usize * w + x as usize] = Some(color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(Some(color));
        Ok(())
    }
}

/// The surface a widget node owns: the panel framebuffer for the root,
/// an off-screen surface for everything else.
#[derive(Debug)]
pub(crate) enum NodeSurface {
    Presentation(FrameBuffer),
    Offscreen(Surface),
}

impl NodeSurface {
    /// Reset the surface to the widget background before repainting.
    ///
    /// The presentation buffer is opaque, so a transparent background
    /// clears it to black.
    pub(crate) fn reset(&mut self, background: Option<Rgb565>) {
        match self {
            NodeSurface::Presentation(fb) => {
                let Ok(()) = fb.clear(background.unwrap_or(Rgb565::BLACK));
            }
            NodeSurface::Offscreen(surface) => surface.fill(background),
        }
    }
}

impl OriginDimensions for NodeSurface {
    fn size(&self) -> Size {
        match self {
            NodeSurface::Presentation(fb) => fb.size(),
            NodeSurface::Offscreen(surface) => surface.size(),
        }
    }
}

impl DrawTarget for NodeSurface {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        match self {
            NodeSurface::Presentation(fb) => fb.draw_iter(pixels),
            NodeSurface::Offscreen(surface) => surface.draw_iter(pixels),
        }
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        match self {
            NodeSurface::Presentation(fb) => fb.fill_solid(area, color),
            NodeSurface::Offscreen(surface) => surface.fill_solid(area, color),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Display stand-in recording the area of each `fill_contiguous` call.
    struct RecordingDisplay {
        size: Size,
        areas: Vec<Rectangle>,
    }

    impl OriginDimensions for RecordingDisplay {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for RecordingDisplay {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }

        fn fill_contiguous<I>(&mut self, area: &Rectangle, _colors: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Self::Color>,
        {
            self.areas.push(*area);
            Ok(())
        }
    }

    #[test]
    fn test_framebuffer_flushes_only_changed_rect() {
        let mut fb = FrameBuffer::try_new(Size::new(32, 16)).unwrap();
        let mut display = RecordingDisplay {
            size: Size::new(32, 16),
            areas: Vec::new(),
        };

        // The first flush covers the whole buffer.
        assert!(fb.flush(&mut display).unwrap());
        assert_eq!(display.areas[0].size, Size::new(32, 16));

        fb.fill_solid(&Rectangle::new(Point::new(4, 2), Size::new(3, 2)), Rgb565::RED)
            .unwrap();
        assert!(fb.flush(&mut display).unwrap());
        assert_eq!(
            display.areas[1],
            Rectangle::new(Point::new(4, 2), Size::new(3, 2))
        );

        // Nothing changed since.
        assert!(!fb.flush(&mut display).unwrap());
        assert_eq!(display.areas.len(), 2);
    }

    #[test]
    fn test_framebuffer_fill_clips_negative_origin() {
        let mut fb = FrameBuffer::try_new(Size::new(10, 10)).unwrap();
        fb.fill_solid(&Rectangle::new(Point::new(-5, 0), Size::new(6, 1)), Rgb565::RED)
            .unwrap();
        fb.fill_solid(&Rectangle::new(Point::new(3, -4), Size::new(1, 6)), Rgb565::GREEN)
            .unwrap();

        let red: Vec<i32> = (0..10)
            .filter(|x| fb.pixel(Point::new(*x, 0)) == Some(Rgb565::RED))
            .collect();
        assert_eq!(red, vec![0]);
        let green: Vec<i32> = (0..10)
            .filter(|y| fb.pixel(Point::new(3, *y)) == Some(Rgb565::GREEN))
            .collect();
        assert_eq!(green, vec![0, 1]);

        // Entirely outside: nothing drawn.
        fb.fill_solid(&Rectangle::new(Point::new(-8, -8), Size::new(4, 4)), Rgb565::BLUE)
            .unwrap();
        assert_eq!(fb.pixel(Point::zero()), Some(Rgb565::RED));
    }

    #[test]
    fn test_framebuffer_same_color_is_not_a_change() {
        let mut fb = FrameBuffer::try_new(Size::new(8, 8)).unwrap();
        let mut display = RecordingDisplay {
            size: Size::new(8, 8),
            areas: Vec::new(),
        };
        fb.flush(&mut display).unwrap();

        fb.clear(Rgb565::BLACK).unwrap();
        assert!(!fb.has_changes());
    }

    #[test]
    fn test_framebuffer_restored_pixels_are_not_flushed() {
        let mut fb = FrameBuffer::try_new(Size::new(8, 8)).unwrap();
        let mut display = RecordingDisplay {
            size: Size::new(8, 8),
            areas: Vec::new(),
        };
        fb.flush(&mut display).unwrap();

        // Cleared and repainted with the same content.
        let spot = Rectangle::new(Point::new(2, 2), Size::new(2, 2));
        fb.fill_solid(&spot, Rgb565::RED).unwrap();
        fb.flush(&mut display).unwrap();
        fb.clear(Rgb565::BLACK).unwrap();
        fb.fill_solid(&spot, Rgb565::RED).unwrap();
        assert!(fb.has_changes());
        assert!(!fb.flush(&mut display).unwrap());

        fb.clear(Rgb565::BLACK).unwrap();
        fb.fill_solid(&Rectangle::new(Point::new(2, 2), Size::new(1, 2)), Rgb565::RED)
            .unwrap();
        assert!(fb.flush(&mut display).unwrap());
        assert_eq!(
            display.areas.last(),
            Some(&Rectangle::new(Point::new(3, 2), Size::new(1, 2)))
        );
    }

    #[test]
    fn test_surface_blit_skips_transparent_pixels() {
        let mut child = Surface::try_new(Size::new(2, 2)).unwrap();
        child
            .draw_iter([Pixel(Point::new(1, 1), Rgb565::GREEN)])
            .unwrap();

        let mut parent = Surface::try_new(Size::new(4, 4)).unwrap();
        parent.fill(Some(Rgb565::BLUE));
        child.blit_onto(&mut parent, Point::new(2, 2)).unwrap();

        assert_eq!(parent.pixel(Point::new(3, 3)), Some(Rgb565::GREEN));
        assert_eq!(parent.pixel(Point::new(2, 2)), Some(Rgb565::BLUE));
    }

    #[test]
    fn test_surface_blit_clips_at_target_edges() {
        let mut child = Surface::try_new(Size::new(3, 3)).unwrap();
        child.fill(Some(Rgb565::RED));

        let mut parent = FrameBuffer::try_new(Size::new(4, 4)).unwrap();
        child.blit_onto(&mut parent, Point::new(-1, 2)).unwrap();

        assert_eq!(parent.pixel(Point::new(0, 2)), Some(Rgb565::RED));
        assert_eq!(parent.pixel(Point::new(1, 3)), Some(Rgb565::RED));
        assert_eq!(parent.pixel(Point::new(2, 2)), Some(Rgb565::BLACK));
    }

    #[test]
    fn test_zero_sized_surface_is_valid() {
        let surface = Surface::try_new(Size::new(0, 10)).unwrap();
        let mut parent = Surface::try_new(Size::new(4, 4)).unwrap();
        surface.blit_onto(&mut parent, Point::zero()).unwrap();
        assert_eq!(parent.pixel(Point::zero()), None);
    }
}
