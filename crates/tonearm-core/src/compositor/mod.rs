//! Compositor loop
//!
//! A single render thread owns the widget tree and the display. Each
//! iteration:
//!
//! 1. waits on the [`UpdateScheduler`] for at most one tick,
//! 2. snapshots and clears the pending categories,
//! 3. folds in the position categories while playback is progressing, and
//!    every content category when the screen is rebuilt,
//! 4. runs the render callbacks for each category in [`Category::PRIORITY`]
//!    order,
//! 5. redraws the tree if anything is dirty and flushes the changed part of
//!    the framebuffer to the display.
//!
//! Per-frame errors are logged and retried on the next tick. Only
//! initialization failures are fatal.

mod handle;
mod state;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use log::{debug, error, info, warn};
use thiserror::Error;

use crate::config::{Config, ConfigError, FontConfig};
use crate::model::PlayerModel;
use crate::scheduler::{Category, UpdateScheduler};
use crate::widget::{FontHandle, RedrawStats, WidgetError, WidgetId, WidgetResult, WidgetTree};

pub use handle::{CompositorHandle, spawn, spawn_with_watch};
pub use state::{CompositorState, StateWatch, TerminationStatus};

/// Errors that stop a compositor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompositorError {
    /// The display could not be acquired
    #[error("display unavailable: {0}")]
    DisplayUnavailable(String),

    /// A configured font name does not match any known font
    #[error("font '{0}' is not available")]
    FontUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("widget tree error: {0}")]
    Widget(#[from] WidgetError),

    /// Flushing the frame to the display failed
    #[error("cannot present frame: {0}")]
    Present(String),

    #[error("cannot spawn compositor thread: {0}")]
    ThreadSpawn(String),

    #[error("compositor thread panicked")]
    Panicked,
}

pub type CompositorResult<T> = Result<T, CompositorError>;

// ---------------------------------------------------------------------------
// Render callbacks
// ---------------------------------------------------------------------------

/// The fonts the screens draw with, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fonts {
    pub small: FontHandle,
    pub regular: FontHandle,
    pub large: FontHandle,
}

impl Fonts {
    /// Resolve every configured font. A missing font is fatal.
    pub fn load(config: &FontConfig) -> CompositorResult<Self> {
        let load = |name: &str| {
            FontHandle::by_name(name).ok_or_else(|| CompositorError::FontUnavailable(name.into()))
        };
        Ok(Self {
            small: load(&config.small)?,
            regular: load(&config.regular)?,
            large: load(&config.large)?,
        })
    }
}

/// Everything a render callback may look at during one iteration.
pub struct RenderContext<'a> {
    pub tree: &'a WidgetTree,
    pub root: WidgetId,
    pub fonts: &'a Fonts,
    pub model: &'a dyn PlayerModel,
    pub config: &'a Config,
    /// Time since the previous iteration.
    pub elapsed: Duration,
    /// Number of the current iteration, starting at 1.
    pub frame: u64,
    /// Categories producers requested, before any were folded in.
    pub requested: Category,
}

/// Rebuilds the part of the tree tied to a set of categories.
///
/// Callbacks run synchronously on the compositor thread and are the only
/// code that mutates the tree.
pub trait CategoryRenderer: Send {
    /// Categories this renderer handles.
    fn categories(&self) -> Category;

    /// Update the widgets for one pending `category`.
    fn render(&mut self, category: Category, ctx: &mut RenderContext<'_>) -> WidgetResult<()>;
}

// ---------------------------------------------------------------------------
// Compositor
// ---------------------------------------------------------------------------

/// What one [`Compositor::iterate`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Categories rendered, including folded-in ones.
    pub categories: Category,
    /// Whether the wait ran out without any request.
    pub timed_out: bool,
    /// Set when a redraw pass ran and completed.
    pub redraw: Option<RedrawStats>,
    /// Whether changed pixels were sent to the display.
    pub presented: bool,
}

pub struct Compositor<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    config: Config,
    display: D,
    tree: Arc<WidgetTree>,
    root: WidgetId,
    fonts: Fonts,
    scheduler: Arc<UpdateScheduler>,
    model: Arc<dyn PlayerModel>,
    renderers: Vec<Box<dyn CategoryRenderer>>,
    state: StateWatch,
    last_iteration: Instant,
    frame: u64,
}

impl<D> Compositor<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: fmt::Debug,
{
    /// Initialize a compositor on an already acquired display.
    ///
    /// Validates the configuration, loads the fonts and allocates the root
    /// framebuffer. Any failure leaves the compositor `Terminated(Error)`.
    pub fn new(
        config: Config,
        display: D,
        scheduler: Arc<UpdateScheduler>,
        model: Arc<dyn PlayerModel>,
        renderers: Vec<Box<dyn CategoryRenderer>>,
    ) -> CompositorResult<Self> {
        Self::with_watch(
            config,
            display,
            scheduler,
            model,
            renderers,
            StateWatch::new(),
        )
    }

    /// Like [`new`](Self::new), reporting every state change to `state`,
    /// including a failed initialization.
    pub fn with_watch(
        config: Config,
        display: D,
        scheduler: Arc<UpdateScheduler>,
        model: Arc<dyn PlayerModel>,
        renderers: Vec<Box<dyn CategoryRenderer>>,
        state: StateWatch,
    ) -> CompositorResult<Self> {
        state
            .shared()
            .advance(CompositorState::Uninitialized, CompositorState::Initializing);

        let tree = Arc::new(WidgetTree::new());
        let (fonts, root) = match Self::init(&config, &display, &tree) {
            Ok(resources) => resources,
            Err(err) => {
                error!("Compositor initialization failed: {}", err);
                state
                    .shared()
                    .set(CompositorState::Terminated(TerminationStatus::Error));
                return Err(err);
            }
        };

        info!(
            "Compositor initialized: {}x{}, tick {} ms, {} renderers",
            config.width,
            config.height,
            config.tick_ms,
            renderers.len()
        );

        Ok(Self {
            config,
            display,
            tree,
            root,
            fonts,
            scheduler,
            model,
            renderers,
            state,
            last_iteration: Instant::now(),
            frame: 0,
        })
    }

    fn init(
        config: &Config,
        display: &D,
        tree: &WidgetTree,
    ) -> CompositorResult<(Fonts, WidgetId)> {
        config.validate()?;

        let panel = display.bounding_box().size;
        if panel.width < config.width || panel.height < config.height {
            return Err(CompositorError::DisplayUnavailable(format!(
                "panel is {}x{}, configured {}x{}",
                panel.width, panel.height, config.width, config.height
            )));
        }

        let fonts = Fonts::load(&config.fonts)?;
        let root = tree.create_root(config.size())?;
        tree.set_background(root, Some(config.background_color()))?;
        tree.set_name(root, "root")?;
        Ok((fonts, root))
    }

    pub fn tree(&self) -> &Arc<WidgetTree> {
        &self.tree
    }

    pub fn root(&self) -> WidgetId {
        self.root
    }

    pub fn scheduler(&self) -> &Arc<UpdateScheduler> {
        &self.scheduler
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn state(&self) -> CompositorState {
        self.state.get()
    }

    /// A watch that outlives the compositor, e.g. across [`run`](Self::run).
    pub fn state_watch(&self) -> StateWatch {
        self.state.clone()
    }

    /// Run one wait → render → redraw → present iteration.
    pub fn iterate(&mut self) -> FrameStats {
        let (requested, timed_out) = {
            let pending = self.scheduler.wait_for_update(self.config.tick());
            let timed_out = pending.timed_out();
            (pending.take(), timed_out)
        };

        let now = Instant::now();
        let elapsed = now.duration_since(self.last_iteration);
        self.last_iteration = now;
        self.frame += 1;

        let mut categories = requested;
        if self.model.playback_state().is_progressing() {
            categories |= Category::POSITION;
        }
        if categories.contains(Category::SCREEN) {
            categories |= Category::CONTENT;
        }
        debug!(
            "Frame {}: {:?} (requested {:?}, {} ms since last)",
            self.frame,
            categories,
            requested,
            elapsed.as_millis()
        );

        let mut ctx = RenderContext {
            tree: &self.tree,
            root: self.root,
            fonts: &self.fonts,
            model: self.model.as_ref(),
            config: &self.config,
            elapsed,
            frame: self.frame,
            requested,
        };
        for category in categories.in_priority_order() {
            if category == Category::REDRAW
                && let Err(err) = ctx.tree.propagate_force_dirty(ctx.root)
            {
                warn!("Forcing a full redraw failed: {}", err);
            }
            for renderer in self.renderers.iter_mut() {
                if !renderer.categories().contains(category) {
                    continue;
                }
                if let Err(err) = renderer.render(category, &mut ctx) {
                    warn!("Rendering {:?} failed: {}", category, err);
                }
            }
        }

        let redraw = match self.tree.aggregate_dirty(self.root) {
            Ok(true) => match self.tree.redraw(self.root) {
                Ok(stats) => Some(stats),
                Err(err) => {
                    warn!("Redraw incomplete, retrying next tick: {}", err);
                    None
                }
            },
            Ok(false) => None,
            Err(err) => {
                warn!("Cannot aggregate dirty state: {}", err);
                None
            }
        };

        let presented = match self.present() {
            Ok(presented) => presented,
            Err(err) => {
                warn!("{}", err);
                false
            }
        };

        FrameStats {
            categories,
            timed_out,
            redraw,
            presented,
        }
    }

    /// Flush the changed rectangle of the root framebuffer to the display.
    ///
    /// Returns `Ok(false)` when nothing changed since the last flush. A
    /// failed flush keeps the changes for the next attempt.
    pub fn present(&mut self) -> CompositorResult<bool> {
        let display = &mut self.display;
        self.tree
            .with_framebuffer(self.root, |framebuffer| framebuffer.flush(display))?
            .map_err(|err| CompositorError::Present(format!("{:?}", err)))
    }

    /// Run until termination is requested, then tear the tree down.
    pub fn run(mut self) -> CompositorResult<()> {
        self.state
            .shared()
            .advance(CompositorState::Initializing, CompositorState::Running);
        self.scheduler.request_update(Category::SCREEN, true);

        while self.state.get() != CompositorState::Terminating {
            self.iterate();
        }

        let result = self.teardown();
        let status = match result {
            Ok(()) => TerminationStatus::Ok,
            Err(_) => TerminationStatus::Error,
        };
        self.state
            .shared()
            .set(CompositorState::Terminated(status));
        result
    }

    /// Release every widget held by the root, cascading through containers,
    /// then the root itself.
    fn teardown(&mut self) -> CompositorResult<()> {
        info!(
            "Compositor stopping after {} frames, releasing {} widgets",
            self.frame,
            self.tree.len()
        );
        self.renderers.clear();
        self.tree.container_clear(self.root)?;
        self.tree.release(self.root)?;
        if !self.tree.is_empty() {
            warn!(
                "{} widgets still alive after teardown (held outside the tree)",
                self.tree.len()
            );
        }
        Ok(())
    }
}
