//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use tonearm_core::compositor::{CategoryRenderer, RenderContext};
use tonearm_core::config::Config;
use tonearm_core::model::{
    ArtworkState, AudioFormat, DeviceInfo, PlaybackMode, PlaybackState, PlayerModel, QueueItem,
    Volume,
};
use tonearm_core::scheduler::Category;
use tonearm_core::widget::WidgetResult;

/// Config with a short tick so that idle iterations return quickly.
pub fn test_config() -> Config {
    Config {
        tick_ms: 10,
        ..Config::default()
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushFailed;

/// Panel stand-in recording each flushed rectangle.
#[derive(Debug, Clone)]
pub struct FakeDisplay {
    pub size: Size,
    pub flushed: Arc<Mutex<Vec<Rectangle>>>,
    pub failing: Arc<AtomicBool>,
}

impl FakeDisplay {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            flushed: Arc::default(),
            failing: Arc::default(),
        }
    }

    pub fn flushed(&self) -> Vec<Rectangle> {
        self.flushed.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl OriginDimensions for FakeDisplay {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for FakeDisplay {
    type Color = Rgb565;
    type Error = FlushFailed;

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
        if self.failing.load(Ordering::SeqCst) {
            return Err(FlushFailed);
        }
        self.flushed.lock().unwrap().push(*area);
        Ok(())
    }
}

/// Never constructed; only names an error type for `spawn`.
pub type NoError = Infallible;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakePlayer {
    pub state: Mutex<PlaybackState>,
    pub seek: Mutex<Duration>,
    pub queue_len: usize,
}

impl FakePlayer {
    pub fn playing() -> Self {
        Self {
            state: Mutex::new(PlaybackState::Playing),
            queue_len: 4,
            ..Self::default()
        }
    }

    pub fn stopped() -> Self {
        Self {
            queue_len: 4,
            ..Self::default()
        }
    }
}

impl PlayerModel for FakePlayer {
    fn current_item(&self) -> Option<QueueItem> {
        self.queue_item(0)
    }

    fn queue_position(&self) -> Option<usize> {
        (self.queue_len > 0).then_some(0)
    }

    fn queue_len(&self) -> usize {
        self.queue_len
    }

    fn queue_item(&self, position: usize) -> Option<QueueItem> {
        (position < self.queue_len).then(|| QueueItem {
            title: format!("Song {}", position),
            artist: "Band".into(),
            album: "Record".into(),
            duration: Some(Duration::from_secs(200)),
            artwork_uri: None,
        })
    }

    fn playback_state(&self) -> PlaybackState {
        *self.state.lock().unwrap()
    }

    fn playback_mode(&self) -> PlaybackMode {
        PlaybackMode::default()
    }

    fn volume(&self) -> Volume {
        Volume::default()
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        None
    }

    fn seek_position(&self) -> Duration {
        *self.seek.lock().unwrap()
    }

    fn device(&self) -> DeviceInfo {
        DeviceInfo::default()
    }

    fn resolve_uri(&self, _uri: &str) -> Option<String> {
        None
    }

    fn artwork(&self, _url: &str, _size: Size) -> ArtworkState {
        ArtworkState::Unavailable
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renderer recording the categories it is called with, one entry per call.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    pub calls: Arc<Mutex<Vec<Category>>>,
}

impl RecordingRenderer {
    pub fn take(&self) -> Vec<Category> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }
}

impl CategoryRenderer for RecordingRenderer {
    fn categories(&self) -> Category {
        Category::all()
    }

    fn render(&mut self, category: Category, _ctx: &mut RenderContext<'_>) -> WidgetResult<()> {
        self.calls.lock().unwrap().push(category);
        Ok(())
    }
}
