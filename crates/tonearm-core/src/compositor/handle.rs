//! Running a compositor on its own thread.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use log::{error, info};

use super::{
    CategoryRenderer, Compositor, CompositorError, CompositorResult, CompositorState, StateWatch,
    TerminationStatus,
};
use crate::config::Config;
use crate::model::PlayerModel;
use crate::scheduler::{Category, UpdateScheduler};
use crate::widget::WidgetTree;

/// Owner side of a compositor thread started with [`spawn`].
///
/// Dropping the handle shuts the compositor down and joins the thread.
#[derive(Debug)]
pub struct CompositorHandle {
    scheduler: Arc<UpdateScheduler>,
    tree: Arc<WidgetTree>,
    state: StateWatch,
    thread: Option<JoinHandle<CompositorResult<()>>>,
}

/// Start a compositor on a new thread named `compositor`.
///
/// The display is opened on the compositor thread by `open_display`, so it
/// does not need to be `Send`. Blocks until initialization finished and
/// returns its error if it failed.
pub fn spawn<D, E, F>(
    config: Config,
    model: Arc<dyn PlayerModel>,
    renderers: Vec<Box<dyn CategoryRenderer>>,
    open_display: F,
) -> CompositorResult<CompositorHandle>
where
    D: DrawTarget<Color = Rgb565> + 'static,
    D::Error: fmt::Debug,
    E: fmt::Display + 'static,
    F: FnOnce(&Config) -> Result<D, E> + Send + 'static,
{
    spawn_with_watch(config, model, renderers, StateWatch::new(), open_display)
}

/// Like [`spawn`], reporting every state change to `state`, including a
/// display that failed to open.
pub fn spawn_with_watch<D, E, F>(
    config: Config,
    model: Arc<dyn PlayerModel>,
    renderers: Vec<Box<dyn CategoryRenderer>>,
    state: StateWatch,
    open_display: F,
) -> CompositorResult<CompositorHandle>
where
    D: DrawTarget<Color = Rgb565> + 'static,
    D::Error: fmt::Debug,
    E: fmt::Display + 'static,
    F: FnOnce(&Config) -> Result<D, E> + Send + 'static,
{
    if let Err(err) = config.validate() {
        state
            .shared()
            .set(CompositorState::Terminated(TerminationStatus::Error));
        return Err(err.into());
    }

    let scheduler = Arc::new(UpdateScheduler::new());
    let (init_tx, init_rx) = mpsc::sync_channel(1);

    let thread_scheduler = Arc::clone(&scheduler);
    let thread_state = state.clone();
    let thread = thread::Builder::new()
        .name("compositor".into())
        .spawn(move || {
            let display = match open_display(&config) {
                Ok(display) => display,
                Err(err) => {
                    let err = CompositorError::DisplayUnavailable(err.to_string());
                    error!("Compositor initialization failed: {}", err);
                    thread_state
                        .shared()
                        .set(CompositorState::Terminated(TerminationStatus::Error));
                    let _ = init_tx.send(Err(err.clone()));
                    return Err(err);
                }
            };

            let compositor = match Compositor::with_watch(
                config,
                display,
                thread_scheduler,
                model,
                renderers,
                thread_state,
            ) {
                Ok(compositor) => compositor,
                Err(err) => {
                    let _ = init_tx.send(Err(err.clone()));
                    return Err(err);
                }
            };
            let _ = init_tx.send(Ok(Arc::clone(compositor.tree())));
            compositor.run()
        })
        .map_err(|err| {
            state
                .shared()
                .set(CompositorState::Terminated(TerminationStatus::Error));
            CompositorError::ThreadSpawn(err.to_string())
        })?;

    let tree = match init_rx.recv() {
        Ok(Ok(tree)) => tree,
        Ok(Err(err)) => {
            let _ = thread.join();
            return Err(err);
        }
        // The thread died before reporting back.
        Err(_) => {
            return Err(match thread.join() {
                Ok(Err(err)) => err,
                _ => CompositorError::Panicked,
            });
        }
    };

    info!("Compositor thread started");
    Ok(CompositorHandle {
        scheduler,
        tree,
        state,
        thread: Some(thread),
    })
}

impl CompositorHandle {
    /// Scheduler for producer threads.
    pub fn scheduler(&self) -> Arc<UpdateScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Shorthand for [`UpdateScheduler::request_update`].
    pub fn request_update(&self, categories: Category, immediate: bool) {
        self.scheduler.request_update(categories, immediate);
    }

    /// The widget tree, for size and offset queries from other threads.
    pub fn tree(&self) -> Arc<WidgetTree> {
        Arc::clone(&self.tree)
    }

    pub fn state(&self) -> CompositorState {
        self.state.get()
    }

    /// A watch that stays readable after [`shutdown`](Self::shutdown).
    pub fn state_watch(&self) -> StateWatch {
        self.state.clone()
    }

    /// Signal `Terminating`, wake the compositor and wait for it to finish.
    pub fn shutdown(mut self) -> CompositorResult<()> {
        self.stop()
    }

    fn stop(&mut self) -> CompositorResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.state.shared().request_termination();
        self.scheduler.interrupt();
        thread.join().map_err(|_| {
            error!("Compositor thread panicked");
            self.state
                .shared()
                .set(CompositorState::Terminated(TerminationStatus::Error));
            CompositorError::Panicked
        })?
    }
}

impl Drop for CompositorHandle {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("Compositor shutdown failed: {}", err);
        }
    }
}
