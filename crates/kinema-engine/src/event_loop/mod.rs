//! Event loop host.
//!
//! Owns the timer queue and background-job plumbing, and implements
//! `FrameHost` for everything above it.

mod queue;
mod runtime;

pub use runtime::{EventLoop, LoopConfig};
