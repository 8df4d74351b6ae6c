//! Core engine-facing contracts.
//!
//! This module defines the stable interface between a platform host (the
//! thing that owns timers and frame requests) and higher layers (the task
//! chain, loaders, tools). Higher layers only see `FrameHost`; they never
//! depend on a concrete loop.

mod host;

pub use host::{Callback, FrameHost, TimerHandle};
