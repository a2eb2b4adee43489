//! Compositor lifecycle state, shared between the render thread and its
//! owner.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;

/// How a compositor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Ok,
    Error,
}

/// Lifecycle of a compositor.
///
/// `Uninitialized → Initializing → Running → Terminating → Terminated`.
/// Initialization failures jump straight to `Terminated(Error)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositorState {
    #[default]
    Uninitialized,
    Initializing,
    Running,
    Terminating,
    Terminated(TerminationStatus),
}

impl CompositorState {
    pub fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

#[derive(Debug, Default)]
pub(crate) struct SharedState(Mutex<CompositorState>);

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, CompositorState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn get(&self) -> CompositorState {
        *self.lock()
    }

    pub(crate) fn set(&self, next: CompositorState) {
        let mut state = self.lock();
        if *state != next {
            info!("Compositor state: {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    /// Move to `next` only if the state is still `current`.
    pub(crate) fn advance(&self, current: CompositorState, next: CompositorState) -> bool {
        let mut state = self.lock();
        if *state != current {
            return false;
        }
        info!("Compositor state: {:?} -> {:?}", current, next);
        *state = next;
        true
    }

    /// Ask a live compositor to stop. Has no effect once terminated.
    pub(crate) fn request_termination(&self) -> bool {
        let mut state = self.lock();
        match *state {
            CompositorState::Terminated(_) | CompositorState::Terminating => false,
            current => {
                info!(
                    "Compositor state: {:?} -> {:?}",
                    current,
                    CompositorState::Terminating
                );
                *state = CompositorState::Terminating;
                true
            }
        }
    }
}

/// Read-only view of a compositor's lifecycle state.
///
/// Clones observe the same compositor and stay valid after it stopped, so
/// the final `Terminated` status can be read once the compositor itself is
/// gone.
#[derive(Debug, Clone, Default)]
pub struct StateWatch(Arc<SharedState>);

impl StateWatch {
    /// A watch for a compositor that has not been created yet.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> CompositorState {
        self.0.get()
    }

    pub(crate) fn shared(&self) -> &SharedState {
        &self.0
    }
}
