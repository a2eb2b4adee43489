//! Desktop simulator for the tonearm player display.
//!
//! Runs the tonearm-core compositor on its own thread, drawing into an SDL2
//! window via `embedded-graphics-simulator`. A mock player with a short
//! synthetic queue stands in for the real playback engine, so every screen
//! section can be exercised without hardware.
//!
//! # Key bindings
//!
//! | Key   | Action                       |
//! |-------|------------------------------|
//! | Space | Play / pause                 |
//! | N     | Next track                   |
//! | P     | Previous track               |
//! | + / - | Volume up / down             |
//! | M     | Mute                         |
//! | S     | Toggle shuffle               |
//! | R     | Cycle repeat mode            |
//! | F     | Force a full redraw          |
//! | Q     | Quit                         |

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use log::{error, info};

use tonearm_core::compositor::{self, CategoryRenderer};
use tonearm_core::config::Config;
use tonearm_core::model::{
    ArtworkState, AudioFormat, DeviceInfo, PlaybackMode, PlaybackState, PlayerModel, QueueItem,
    RepeatMode, Volume,
};
use tonearm_core::scheduler::{Category, UpdateScheduler};
use tonearm_core::screens::NowPlayingScreen;

// ---------------------------------------------------------------------------
// Simulator constants
// ---------------------------------------------------------------------------

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

/// Window refresh period (~30 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// How often the mock engine checks for the end of the current track.
const ENGINE_PERIOD: Duration = Duration::from_millis(200);

/// Fake time it takes to "decode" a piece of artwork.
const ARTWORK_DECODE_DELAY: Duration = Duration::from_millis(400);

const VOLUME_STEP: u8 = 5;

// ---------------------------------------------------------------------------
// Shared display
// ---------------------------------------------------------------------------

/// SDL display shared between the compositor thread (drawing) and the main
/// thread (window updates).
#[derive(Clone)]
struct SharedDisplay(Arc<Mutex<SimulatorDisplay<Rgb565>>>);

impl SharedDisplay {
    fn new(size: Size) -> Self {
        Self(Arc::new(Mutex::new(SimulatorDisplay::new(size))))
    }

    fn lock(&self) -> MutexGuard<'_, SimulatorDisplay<Rgb565>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OriginDimensions for SharedDisplay {
    fn size(&self) -> Size {
        self.lock().size()
    }
}

impl DrawTarget for SharedDisplay {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.lock().draw_iter(pixels)
    }
}

// ---------------------------------------------------------------------------
// Mock player
// ---------------------------------------------------------------------------

struct MockState {
    queue: Vec<QueueItem>,
    cursor: usize,
    playback: PlaybackState,
    mode: PlaybackMode,
    volume: Volume,
    /// Position at the last play/pause/seek.
    position: Duration,
    resumed_at: Option<Instant>,
    artwork: HashMap<String, Vec<Rgb565>>,
    decoding: Vec<(String, Size)>,
}

impl MockState {
    fn seek_position(&self) -> Duration {
        match self.resumed_at {
            Some(resumed) => self.position + resumed.elapsed(),
            None => self.position,
        }
    }

    fn jump_to(&mut self, cursor: usize) {
        self.cursor = cursor;
        self.position = Duration::ZERO;
        if self.resumed_at.is_some() {
            self.resumed_at = Some(Instant::now());
        }
    }
}

/// In-memory player with a fixed synthetic queue.
struct MockPlayer {
    state: Mutex<MockState>,
}

impl MockPlayer {
    fn new() -> Self {
        let tracks = [
            ("Blue in Green", "Miles Davis", "Kind of Blue", 337),
            ("Teardrop", "Massive Attack", "Mezzanine", 330),
            ("Svefn-g-englar", "Sigur Ros", "Agaetis byrjun", 604),
            ("Windowlicker", "Aphex Twin", "Windowlicker", 367),
            ("Roygbiv", "Boards of Canada", "Music Has the Right", 151),
            ("Hyperballad", "Bjork", "Post", 321),
            ("Pyramid Song", "Radiohead", "Amnesiac", 289),
            ("Avril 14th", "Aphex Twin", "Drukqs", 125),
            ("Night Radio", "Internet Radio", "Live", 0),
        ];
        let queue = tracks
            .iter()
            .enumerate()
            .map(|(n, (title, artist, album, secs))| QueueItem {
                title: (*title).into(),
                artist: (*artist).into(),
                album: (*album).into(),
                duration: (*secs > 0).then(|| Duration::from_secs(*secs)),
                artwork_uri: Some(format!("/artwork/{}.png", n)),
            })
            .collect();

        Self {
            state: Mutex::new(MockState {
                queue,
                cursor: 0,
                playback: PlaybackState::Stopped,
                mode: PlaybackMode::default(),
                volume: Volume::default(),
                position: Duration::ZERO,
                resumed_at: None,
                artwork: HashMap::new(),
                decoding: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Toggle play/pause. Returns the categories that changed.
    fn toggle_play(&self) -> Category {
        let mut state = self.lock();
        if state.playback.is_progressing() {
            state.position = state.seek_position();
            state.resumed_at = None;
            state.playback = PlaybackState::Paused;
        } else {
            state.resumed_at = Some(Instant::now());
            state.playback = PlaybackState::Playing;
        }
        Category::PLAYBACK_STATE | Category::POSITION
    }

    fn skip(&self, forward: bool) -> Category {
        let mut state = self.lock();
        let len = state.queue.len();
        let next = if forward {
            (state.cursor + 1) % len
        } else {
            (state.cursor + len - 1) % len
        };
        state.jump_to(next);
        Category::CURRENT_ITEM | Category::QUEUE | Category::POSITION
    }

    fn change_volume(&self, up: bool) -> Category {
        let mut state = self.lock();
        let level = state.volume.level;
        state.volume.level = if up {
            level.saturating_add(VOLUME_STEP).min(100)
        } else {
            level.saturating_sub(VOLUME_STEP)
        };
        Category::VOLUME
    }

    fn toggle_mute(&self) -> Category {
        let mut state = self.lock();
        state.volume.muted = !state.volume.muted;
        Category::VOLUME
    }

    fn toggle_shuffle(&self) -> Category {
        let mut state = self.lock();
        state.mode.shuffle = !state.mode.shuffle;
        Category::PLAYBACK_MODE
    }

    fn cycle_repeat(&self) -> Category {
        let mut state = self.lock();
        state.mode.repeat = match state.mode.repeat {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        };
        Category::PLAYBACK_MODE
    }

    /// Advance past the end of the current track, if it ended.
    fn check_track_end(&self) -> Category {
        let mut state = self.lock();
        let Some(duration) = state.queue[state.cursor].duration else {
            return Category::empty();
        };
        if !state.playback.is_progressing() || state.seek_position() < duration {
            return Category::empty();
        }

        let cursor = state.cursor;
        let len = state.queue.len();
        let last = cursor + 1 == len;
        match state.mode.repeat {
            RepeatMode::One => state.jump_to(cursor),
            RepeatMode::Off if last => {
                state.jump_to(0);
                state.resumed_at = None;
                state.playback = PlaybackState::Stopped;
                return Category::CURRENT_ITEM
                    | Category::QUEUE
                    | Category::PLAYBACK_STATE
                    | Category::POSITION;
            }
            _ => state.jump_to((cursor + 1) % len),
        }
        Category::CURRENT_ITEM | Category::QUEUE | Category::POSITION
    }

    /// Finish every pending artwork decode. Returns whether any completed.
    fn finish_decodes(&self) -> bool {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.decoding);
        let finished = !pending.is_empty();
        for (url, size) in pending {
            let seed = url
                .bytes()
                .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
            state.artwork.insert(url, gradient(size, seed));
        }
        finished
    }
}

/// Two-color diagonal gradient standing in for decoded cover art.
fn gradient(size: Size, seed: u32) -> Vec<Rgb565> {
    let (w, h) = (size.width.max(1), size.height.max(1));
    let hue = (seed % 32) as u8;
    (0..h)
        .flat_map(|y| (0..w).map(move |x| (x, y)))
        .map(|(x, y)| {
            let t = ((x + y) * 31 / (w + h)) as u8;
            Rgb565::new(hue ^ t, (t * 2) & 0x3f, 31 - t)
        })
        .collect()
}

impl PlayerModel for MockPlayer {
    fn current_item(&self) -> Option<QueueItem> {
        let state = self.lock();
        state.queue.get(state.cursor).cloned()
    }

    fn queue_position(&self) -> Option<usize> {
        Some(self.lock().cursor)
    }

    fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    fn queue_item(&self, position: usize) -> Option<QueueItem> {
        self.lock().queue.get(position).cloned()
    }

    fn playback_state(&self) -> PlaybackState {
        self.lock().playback
    }

    fn playback_mode(&self) -> PlaybackMode {
        self.lock().mode
    }

    fn volume(&self) -> Volume {
        self.lock().volume
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        let state = self.lock();
        state.queue[state.cursor].duration.map(|_| AudioFormat {
            codec: "FLAC".into(),
            sample_rate_hz: 44_100,
            bit_depth: 16,
            channels: 2,
        })
    }

    fn seek_position(&self) -> Duration {
        self.lock().seek_position()
    }

    fn device(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Simulator".into(),
            identity: "sim-0001".into(),
            registered: true,
        }
    }

    fn resolve_uri(&self, uri: &str) -> Option<String> {
        Some(format!("http://localhost:9000{}", uri))
    }

    fn artwork(&self, url: &str, size: Size) -> ArtworkState {
        let mut state = self.lock();
        if let Some(pixels) = state.artwork.get(url) {
            return ArtworkState::Ready(pixels.clone());
        }
        if !state.decoding.iter().any(|(pending, _)| pending == url) {
            state.decoding.push((url.into(), size));
        }
        ArtworkState::Pending
    }
}

// ---------------------------------------------------------------------------
// Mock engine
// ---------------------------------------------------------------------------

/// Producer thread standing in for the playback engine and artwork decoder.
fn spawn_engine(
    player: Arc<MockPlayer>,
    scheduler: Arc<UpdateScheduler>,
    running: Arc<AtomicBool>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("mock-engine".into())
        .spawn(move || {
            let mut last_decode = Instant::now();
            while running.load(Ordering::Relaxed) {
                let changed = player.check_track_end();
                if !changed.is_empty() {
                    info!("Track ended, now at {:?}", player.queue_position());
                    scheduler.request_update(changed, true);
                }

                if last_decode.elapsed() >= ARTWORK_DECODE_DELAY {
                    if player.finish_decodes() {
                        scheduler.request_update(Category::CURRENT_ITEM, true);
                    }
                    last_decode = Instant::now();
                }

                thread::sleep(ENGINE_PERIOD);
            }
        })
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Apply a key press to the player, returning the categories to refresh.
fn handle_key(player: &MockPlayer, keycode: Keycode) -> Option<(Category, bool)> {
    let categories = match keycode {
        Keycode::Space => player.toggle_play(),
        Keycode::N => player.skip(true),
        Keycode::P => player.skip(false),
        Keycode::Plus | Keycode::Equals | Keycode::KpPlus => player.change_volume(true),
        Keycode::Minus | Keycode::KpMinus => player.change_volume(false),
        Keycode::M => player.toggle_mute(),
        Keycode::S => player.toggle_shuffle(),
        Keycode::R => player.cycle_repeat(),
        // A full redraw can wait for the next tick.
        Keycode::F => return Some((Category::REDRAW, false)),
        _ => return None,
    };
    Some((categories, true))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    info!("Starting tonearm simulator");

    let config = Config::default();
    info!(
        "Display: {}×{} (scale {}×), tick {} ms",
        config.width, config.height, WINDOW_SCALE, config.tick_ms
    );
    info!(
        "Keys: Space=Play/Pause  N/P=Next/Prev  +/-=Volume  M=Mute  S=Shuffle  R=Repeat  F=Redraw  Q=Quit"
    );

    let display = SharedDisplay::new(config.size());
    let player = Arc::new(MockPlayer::new());
    let renderers: Vec<Box<dyn CategoryRenderer>> = vec![Box::new(NowPlayingScreen::new())];

    let compositor_display = display.clone();
    let handle = match compositor::spawn(config, player.clone(), renderers, move |_: &Config| {
        Ok::<_, Infallible>(compositor_display)
    }) {
        Ok(handle) => handle,
        Err(err) => {
            error!("Failed to start compositor: {}", err);
            return;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let engine = match spawn_engine(player.clone(), handle.scheduler(), Arc::clone(&running)) {
        Ok(engine) => engine,
        Err(err) => {
            error!("Failed to start mock engine: {}", err);
            return;
        }
    };

    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let mut window = Window::new("Tonearm Simulator", &output_settings);

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    window.update(&display.lock());

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    'running: loop {
        let frame_start = Instant::now();

        // --- SDL events ---------------------------------------------------
        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,

                SimulatorEvent::KeyDown { keycode, .. } => {
                    if keycode == Keycode::Q || keycode == Keycode::Escape {
                        break 'running;
                    }

                    if let Some((categories, immediate)) = handle_key(&player, keycode) {
                        info!("{:?} -> {:?}", keycode, categories);
                        handle.request_update(categories, immediate);
                    }
                }

                _ => {}
            }
        }

        if handle.state().is_terminated() {
            error!("Compositor stopped unexpectedly");
            break 'running;
        }

        // --- Present ------------------------------------------------------
        window.update(&display.lock());

        // --- Frame pacing -------------------------------------------------
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            thread::sleep(FRAME_DURATION - elapsed);
        }
    }

    running.store(false, Ordering::Relaxed);
    if engine.join().is_err() {
        error!("Mock engine panicked");
    }
    if let Err(err) = handle.shutdown() {
        error!("Compositor shutdown failed: {}", err);
    }
    info!("Simulator exiting");
}
