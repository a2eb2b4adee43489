//! End-to-end compositor behavior against a fake display and player.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use embedded_graphics::prelude::*;

use common::{FakeDisplay, FakePlayer, NoError, RecordingRenderer, test_config};
use tonearm_core::compositor::{
    self, CategoryRenderer, Compositor, CompositorError, CompositorState, StateWatch,
    TerminationStatus,
};
use tonearm_core::config::{Config, ConfigError};
use tonearm_core::model::PlayerModel;
use tonearm_core::scheduler::{Category, UpdateScheduler};
use tonearm_core::screens::NowPlayingScreen;

fn compositor_with(
    player: Arc<FakePlayer>,
    renderers: Vec<Box<dyn CategoryRenderer>>,
) -> (Compositor<FakeDisplay>, FakeDisplay) {
    let config = test_config();
    let display = FakeDisplay::new(config.size());
    let model: Arc<dyn PlayerModel> = player;
    let compositor = Compositor::new(
        config,
        display.clone(),
        Arc::new(UpdateScheduler::new()),
        model,
        renderers,
    )
    .unwrap();
    (compositor, display)
}

#[test]
fn test_callbacks_run_in_priority_order() {
    let recorder = RecordingRenderer::default();
    let (mut compositor, _) = compositor_with(
        Arc::new(FakePlayer::stopped()),
        vec![Box::new(recorder.clone())],
    );

    let scheduler = Arc::clone(compositor.scheduler());
    scheduler.request_update(Category::REDRAW | Category::POSITION_SLIDER, false);
    scheduler.request_update(Category::VOLUME | Category::CONFIGURATION, false);
    scheduler.request_update(Category::QUEUE, true);
    compositor.iterate();

    assert_eq!(
        recorder.take(),
        vec![
            Category::CONFIGURATION,
            Category::QUEUE,
            Category::VOLUME,
            Category::POSITION_SLIDER,
            Category::REDRAW
        ]
    );
}

#[test]
fn test_burst_is_rendered_in_one_iteration() {
    let recorder = RecordingRenderer::default();
    let (mut compositor, _) = compositor_with(
        Arc::new(FakePlayer::stopped()),
        vec![Box::new(recorder.clone())],
    );

    let scheduler = Arc::clone(compositor.scheduler());
    scheduler.request_update(Category::POSITION_STRING, false);
    let producer = Arc::clone(&scheduler);
    thread::spawn(move || producer.request_update(Category::POSITION_SLIDER, true))
        .join()
        .unwrap();

    let stats = compositor.iterate();
    assert_eq!(stats.categories, Category::POSITION);
    assert_eq!(
        recorder.take(),
        vec![Category::POSITION_STRING, Category::POSITION_SLIDER]
    );

    // Everything was drained; the next iteration is an idle tick.
    let stats = compositor.iterate();
    assert!(stats.timed_out);
    assert!(stats.categories.is_empty());
    assert!(recorder.take().is_empty());
}

#[test]
fn test_playing_folds_in_position_on_idle_tick() {
    let recorder = RecordingRenderer::default();
    let (mut compositor, _) = compositor_with(
        Arc::new(FakePlayer::playing()),
        vec![Box::new(recorder.clone())],
    );

    let stats = compositor.iterate();
    assert!(stats.timed_out);
    assert_eq!(stats.categories, Category::POSITION);
}

#[test]
fn test_screen_implies_every_content_category() {
    let recorder = RecordingRenderer::default();
    let (mut compositor, _) = compositor_with(
        Arc::new(FakePlayer::stopped()),
        vec![Box::new(recorder.clone())],
    );

    compositor.scheduler().request_update(Category::SCREEN, true);
    let stats = compositor.iterate();
    assert_eq!(stats.categories, Category::SCREEN | Category::CONTENT);
    assert_eq!(recorder.take().first(), Some(&Category::SCREEN));
}

#[test]
fn test_only_changed_pixels_are_presented() {
    let player = Arc::new(FakePlayer::stopped());
    let (mut compositor, display) = compositor_with(
        Arc::clone(&player),
        vec![Box::new(NowPlayingScreen::new())],
    );

    compositor.scheduler().request_update(Category::SCREEN, true);
    let first = compositor.iterate();
    assert!(first.presented);
    assert!(first.redraw.is_some_and(|stats| stats.painted > 0));
    assert_eq!(display.flushed()[0].size, Size::new(320, 240));

    // Nothing requested and nothing playing: no redraw, no flush.
    let idle = compositor.iterate();
    assert!(idle.redraw.is_none());
    assert!(!idle.presented);

    // Rebuilt with identical content: repainted, but nothing to send.
    compositor.scheduler().request_update(Category::VOLUME, true);
    let same = compositor.iterate();
    assert!(same.redraw.is_some());
    assert!(!same.presented);
    assert_eq!(display.flushed().len(), 1);

    *player.seek.lock().unwrap() = Duration::from_secs(61);
    compositor
        .scheduler()
        .request_update(Category::POSITION_STRING, true);
    let seeked = compositor.iterate();
    assert!(seeked.presented);
    let area = display.flushed()[1];
    assert!(area.size.width < 320);
    assert!(area.size.height <= 12);
}

#[test]
fn test_redraw_category_repaints_the_whole_tree() {
    let (mut compositor, _) = compositor_with(
        Arc::new(FakePlayer::stopped()),
        vec![Box::new(NowPlayingScreen::new())],
    );
    compositor.scheduler().request_update(Category::SCREEN, true);
    compositor.iterate();

    compositor.scheduler().request_update(Category::REDRAW, true);
    let stats = compositor.iterate();
    assert_eq!(
        stats.redraw.map(|stats| stats.painted),
        Some(compositor.tree().len())
    );
}

#[test]
fn test_failed_flush_is_retried() {
    let (mut compositor, display) = compositor_with(
        Arc::new(FakePlayer::stopped()),
        vec![Box::new(NowPlayingScreen::new())],
    );

    display.set_failing(true);
    compositor.scheduler().request_update(Category::SCREEN, true);
    let failed = compositor.iterate();
    assert!(!failed.presented);
    assert!(display.flushed().is_empty());

    display.set_failing(false);
    let retried = compositor.iterate();
    assert!(retried.redraw.is_none());
    assert!(retried.presented);
    assert_eq!(display.flushed().len(), 1);
}

#[test]
fn test_unknown_font_is_fatal() {
    let mut config = test_config();
    config.fonts.large = "comic-sans".into();
    let result = Compositor::new(
        config.clone(),
        FakeDisplay::new(config.size()),
        Arc::new(UpdateScheduler::new()),
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
    );
    assert_eq!(
        result.err(),
        Some(CompositorError::FontUnavailable("comic-sans".into()))
    );
}

#[test]
fn test_failed_initialization_terminates_with_error() {
    let mut config = test_config();
    config.fonts.small = "comic-sans".into();
    let state = StateWatch::new();
    let result = Compositor::with_watch(
        config.clone(),
        FakeDisplay::new(config.size()),
        Arc::new(UpdateScheduler::new()),
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
        state.clone(),
    );
    assert!(result.is_err());
    assert_eq!(
        state.get(),
        CompositorState::Terminated(TerminationStatus::Error)
    );

    let state = StateWatch::new();
    let result = compositor::spawn_with_watch(
        test_config(),
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
        state.clone(),
        |_: &Config| Ok::<_, NoError>(FakeDisplay::new(Size::new(160, 120))),
    );
    assert!(result.is_err());
    assert_eq!(
        state.get(),
        CompositorState::Terminated(TerminationStatus::Error)
    );

    let state = StateWatch::new();
    let result = compositor::spawn_with_watch(
        test_config(),
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
        state.clone(),
        |_: &Config| Err::<FakeDisplay, _>("no framebuffer device"),
    );
    assert!(result.is_err());
    assert_eq!(
        state.get(),
        CompositorState::Terminated(TerminationStatus::Error)
    );
}

#[test]
fn test_spawn_reports_initialization_failures() {
    let unavailable = compositor::spawn(
        test_config(),
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
        |_: &Config| Err::<FakeDisplay, _>("no framebuffer device"),
    );
    assert_eq!(
        unavailable.err(),
        Some(CompositorError::DisplayUnavailable(
            "no framebuffer device".into()
        ))
    );

    let too_small = compositor::spawn(
        test_config(),
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
        |_: &Config| Ok::<_, NoError>(FakeDisplay::new(Size::new(160, 120))),
    );
    assert!(matches!(
        too_small.err(),
        Some(CompositorError::DisplayUnavailable(_))
    ));

    let invalid = compositor::spawn(
        Config {
            queue_slots: 4,
            ..test_config()
        },
        Arc::new(FakePlayer::stopped()),
        Vec::new(),
        |config: &Config| Ok::<_, NoError>(FakeDisplay::new(config.size())),
    );
    assert_eq!(
        invalid.err(),
        Some(CompositorError::InvalidConfig(ConfigError::QueueSlots(4)))
    );
}

#[test]
fn test_spawned_compositor_runs_and_tears_down() {
    let display = FakeDisplay::new(test_config().size());
    let thread_display = display.clone();
    let handle = compositor::spawn(
        test_config(),
        Arc::new(FakePlayer::playing()),
        vec![Box::new(NowPlayingScreen::new())],
        move |_: &Config| Ok::<_, NoError>(thread_display),
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while display.flushed().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.state(), CompositorState::Running);
    let tree = handle.tree();
    assert!(tree.len() > 1);

    handle.request_update(Category::QUEUE, true);
    let state = handle.state_watch();
    handle.shutdown().unwrap();
    assert!(tree.is_empty());
    assert_eq!(
        state.get(),
        CompositorState::Terminated(TerminationStatus::Ok)
    );
}
