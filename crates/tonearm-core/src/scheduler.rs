//! Update mailbox shared between producer threads and the compositor.
//!
//! Producers flag which displayed facts changed with
//! [`UpdateScheduler::request_update`]. Requests are OR-ed into a single
//! bitmask, so any burst of signals between two drains collapses into one
//! set of categories and one re-render.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bitflags::bitflags;
use log::trace;

bitflags! {
    /// One displayable fact that may have changed.
    ///
    /// Combine with bitwise OR: `Category::VOLUME | Category::AUDIO_FORMAT`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Category: u16 {
        /// Rebuild the whole screen layout.
        const SCREEN = 1 << 0;
        const CURRENT_ITEM = 1 << 1;
        const QUEUE = 1 << 2;
        /// Device name, identity or registration changed.
        const CONFIGURATION = 1 << 3;
        const PLAYBACK_STATE = 1 << 4;
        const PLAYBACK_MODE = 1 << 5;
        const VOLUME = 1 << 6;
        const AUDIO_FORMAT = 1 << 7;
        const POSITION_SLIDER = 1 << 8;
        const POSITION_STRING = 1 << 9;
        /// The display backend lost or damaged the frame.
        const REDRAW = 1 << 10;
    }
}

impl Category {
    /// Order in which render callbacks run when several categories are
    /// pending. Content comes before transient overlays such as the position
    /// cursor.
    pub const PRIORITY: [Category; 11] = [
        Category::SCREEN,
        Category::CONFIGURATION,
        Category::CURRENT_ITEM,
        Category::QUEUE,
        Category::PLAYBACK_STATE,
        Category::PLAYBACK_MODE,
        Category::VOLUME,
        Category::AUDIO_FORMAT,
        Category::POSITION_STRING,
        Category::POSITION_SLIDER,
        Category::REDRAW,
    ];

    /// Both time-derived position widgets.
    pub const POSITION: Category = Category::POSITION_SLIDER.union(Category::POSITION_STRING);

    /// Every category that fills a section of a freshly built screen.
    pub const CONTENT: Category = Category::all()
        .difference(Category::SCREEN)
        .difference(Category::REDRAW);

    /// The single flags contained in `self`, in [`PRIORITY`](Self::PRIORITY)
    /// order.
    pub fn in_priority_order(self) -> impl Iterator<Item = Category> {
        Self::PRIORITY
            .into_iter()
            .filter(move |category| self.contains(*category))
    }
}

#[derive(Debug, Default)]
struct Mailbox {
    pending: Category,
    interrupted: bool,
}

/// Thread-safe category mailbox with a bounded blocking wait.
///
/// Any thread may request updates; exactly one consumer waits on it.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    mailbox: Mutex<Mailbox>,
    wakeup: Condvar,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Mailbox> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flag `categories` as changed.
    ///
    /// An empty set is a no-op. With `immediate` the waiting consumer is
    /// woken now, otherwise the categories are picked up at the next tick.
    pub fn request_update(&self, categories: Category, immediate: bool) {
        if categories.is_empty() {
            return;
        }
        let mut mailbox = self.lock();
        mailbox.pending |= categories;
        trace!("Update requested: {:?} (immediate: {})", categories, immediate);
        if immediate {
            self.wakeup.notify_one();
        }
    }

    /// Block until categories are pending, the scheduler is interrupted or
    /// `timeout` elapses.
    ///
    /// The returned guard keeps the mailbox locked, so reading and clearing
    /// it with [`PendingUpdates::take`] is atomic with respect to producers.
    pub fn wait_for_update(&self, timeout: Duration) -> PendingUpdates<'_> {
        let mailbox = self.lock();
        let (mailbox, result) = self
            .wakeup
            .wait_timeout_while(mailbox, timeout, |mailbox| {
                mailbox.pending.is_empty() && !mailbox.interrupted
            })
            .unwrap_or_else(PoisonError::into_inner);
        let timed_out = result.timed_out() && mailbox.pending.is_empty();
        PendingUpdates { mailbox, timed_out }
    }

    /// Wake the consumer and make every later wait return immediately.
    ///
    /// Used for shutdown; the flag is never cleared.
    pub fn interrupt(&self) {
        self.lock().interrupted = true;
        self.wakeup.notify_all();
    }

    /// Categories currently pending, without clearing them.
    pub fn pending(&self) -> Category {
        self.lock().pending
    }
}

/// Locked view of the mailbox returned by
/// [`UpdateScheduler::wait_for_update`].
#[derive(Debug)]
pub struct PendingUpdates<'a> {
    mailbox: MutexGuard<'a, Mailbox>,
    timed_out: bool,
}

impl PendingUpdates<'_> {
    pub fn categories(&self) -> Category {
        self.mailbox.pending
    }

    /// Whether the wait ran out with nothing pending.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn interrupted(&self) -> bool {
        self.mailbox.interrupted
    }

    /// Snapshot and clear the pending categories, releasing the lock.
    pub fn take(mut self) -> Category {
        core::mem::take(&mut self.mailbox.pending)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    const SHORT: Duration = Duration::from_millis(10);

    #[test]
    fn test_empty_request_is_noop() {
        let scheduler = UpdateScheduler::new();
        scheduler.request_update(Category::empty(), true);
        assert!(scheduler.pending().is_empty());

        let pending = scheduler.wait_for_update(SHORT);
        assert!(pending.timed_out());
        assert!(pending.take().is_empty());
    }

    #[test]
    fn test_requests_coalesce_until_drained() {
        let scheduler = UpdateScheduler::new();
        scheduler.request_update(Category::VOLUME, false);
        scheduler.request_update(Category::VOLUME | Category::QUEUE, false);
        scheduler.request_update(Category::PLAYBACK_STATE, true);

        let pending = scheduler.wait_for_update(SHORT);
        assert!(!pending.timed_out());
        assert_eq!(
            pending.take(),
            Category::VOLUME | Category::QUEUE | Category::PLAYBACK_STATE
        );
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn test_deferred_and_immediate_requests_arrive_together() {
        let scheduler = Arc::new(UpdateScheduler::new());
        scheduler.request_update(Category::POSITION_STRING, false);

        let producer = Arc::clone(&scheduler);
        let handle = thread::spawn(move || {
            producer.request_update(Category::POSITION_SLIDER, true);
        });
        handle.join().unwrap();

        let taken = scheduler.wait_for_update(Duration::from_secs(1)).take();
        assert_eq!(taken, Category::POSITION);
    }

    #[test]
    fn test_immediate_request_wakes_blocked_consumer() {
        let scheduler = Arc::new(UpdateScheduler::new());
        let producer = Arc::clone(&scheduler);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.request_update(Category::CURRENT_ITEM, true);
        });

        let started = Instant::now();
        let taken = scheduler.wait_for_update(Duration::from_secs(10)).take();
        assert_eq!(taken, Category::CURRENT_ITEM);
        assert!(started.elapsed() < Duration::from_secs(10));
        handle.join().unwrap();
    }

    #[test]
    fn test_deferred_request_is_seen_after_timeout() {
        let scheduler = UpdateScheduler::new();
        scheduler.request_update(Category::QUEUE, false);

        let pending = scheduler.wait_for_update(SHORT);
        assert!(!pending.timed_out());
        assert_eq!(pending.categories(), Category::QUEUE);
    }

    #[test]
    fn test_interrupt_is_sticky() {
        let scheduler = UpdateScheduler::new();
        scheduler.interrupt();
        for _ in 0..2 {
            let pending = scheduler.wait_for_update(Duration::from_secs(10));
            assert!(pending.interrupted());
            assert!(pending.take().is_empty());
        }
    }

    #[test]
    fn test_priority_order_is_fixed() {
        let set =
            Category::REDRAW | Category::POSITION_SLIDER | Category::SCREEN | Category::VOLUME;
        let order: Vec<_> = set.in_priority_order().collect();
        assert_eq!(
            order,
            vec![
                Category::SCREEN,
                Category::VOLUME,
                Category::POSITION_SLIDER,
                Category::REDRAW
            ]
        );
        assert_eq!(Category::all().in_priority_order().count(), Category::PRIORITY.len());
    }

    #[test]
    fn test_content_excludes_screen_and_redraw() {
        assert!(!Category::CONTENT.contains(Category::SCREEN));
        assert!(!Category::CONTENT.contains(Category::REDRAW));
        assert!(Category::CONTENT.contains(Category::POSITION | Category::QUEUE));
    }
}
