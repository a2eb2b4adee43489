//! Read-only view of the player state shown on the display.
//!
//! The compositor never owns domain state. Render callbacks query a
//! [`PlayerModel`] for snapshots, and whoever owns the real state (playback
//! engine, queue manager, cloud client) flags changes through the
//! [`UpdateScheduler`](crate::scheduler::UpdateScheduler).

use core::fmt;
use core::time::Duration;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// One entry of the play queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueItem {
    pub title: String,
    pub artist: String,
    pub album: String,
    /// `None` for streams without a known length.
    pub duration: Option<Duration>,
    /// Content-relative artwork reference, resolved with
    /// [`PlayerModel::resolve_uri`].
    pub artwork_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stopped => "Stopped",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }

    /// Whether the play position advances with wall-clock time.
    pub const fn is_progressing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackMode {
    pub repeat: RepeatMode,
    pub shuffle: bool,
}

impl PlaybackMode {
    /// Short status text, e.g. `"Shuffle  Repeat all"`.
    pub fn label(self) -> String {
        let mut parts = Vec::new();
        if self.shuffle {
            parts.push("Shuffle");
        }
        match self.repeat {
            RepeatMode::Off => {}
            RepeatMode::One => parts.push("Repeat one"),
            RepeatMode::All => parts.push("Repeat all"),
        }
        parts.join("  ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume {
    /// 0..=100
    pub level: u8,
    pub muted: bool,
}

impl Default for Volume {
    fn default() -> Self {
        Self {
            level: 50,
            muted: false,
        }
    }
}

/// Audio format of the current stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioFormat {
    pub codec: String,
    pub sample_rate_hz: u32,
    pub bit_depth: u8,
    pub channels: u8,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let khz = self.sample_rate_hz / 1000;
        let frac = (self.sample_rate_hz % 1000) / 100;
        if frac == 0 {
            write!(f, "{} {}kHz/{}bit", self.codec, khz, self.bit_depth)
        } else {
            write!(f, "{} {}.{}kHz/{}bit", self.codec, khz, frac, self.bit_depth)
        }
    }
}

/// Identity of this device in the cloud service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub name: String,
    pub identity: String,
    pub registered: bool,
}

/// Result of asking for decoded artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkState {
    /// Row-major pixels covering exactly the requested size.
    Ready(Vec<Rgb565>),
    /// Fetch or decode in progress. The owner requests
    /// [`Category::CURRENT_ITEM`](crate::scheduler::Category::CURRENT_ITEM)
    /// once it completes.
    Pending,
    /// No artwork can be produced for this URL.
    Unavailable,
}

// ---------------------------------------------------------------------------
// PlayerModel trait
// ---------------------------------------------------------------------------

/// Pure queries the compositor performs on the player.
///
/// Implementations are shared with producer threads and must be cheap to
/// call from the compositor thread; none of them may block on I/O.
pub trait PlayerModel: Send + Sync {
    /// The item under the queue cursor.
    fn current_item(&self) -> Option<QueueItem>;

    /// Position of the cursor inside the queue.
    fn queue_position(&self) -> Option<usize>;

    fn queue_len(&self) -> usize;

    fn queue_item(&self, position: usize) -> Option<QueueItem>;

    fn playback_state(&self) -> PlaybackState;

    fn playback_mode(&self) -> PlaybackMode;

    fn volume(&self) -> Volume;

    fn audio_format(&self) -> Option<AudioFormat>;

    /// Elapsed position in the current item.
    fn seek_position(&self) -> Duration;

    fn device(&self) -> DeviceInfo;

    /// Turn a content-relative URI into a fetchable URL.
    fn resolve_uri(&self, uri: &str) -> Option<String>;

    /// Decoded artwork for a resolved `url`, scaled to `size`.
    fn artwork(&self, url: &str, size: Size) -> ArtworkState;
}
