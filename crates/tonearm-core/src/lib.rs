//! Hardware-independent core library for the tonearm player display
//!
//! This crate contains the render side of the device: a thread-safe update
//! mailbox that producer threads use to flag changed player facts, a
//! retained-mode widget tree with per-node dirty tracking, and the compositor
//! loop that rebuilds, redraws and presents the frame on a single thread.
//!
//! Player state itself (queue, volume, playback) lives elsewhere and is only
//! read through the [`model::PlayerModel`] trait.

pub mod compositor;
pub mod config;
pub mod model;
pub mod scheduler;
pub mod screens;
pub mod surface;
pub mod ui;
pub mod widget;
