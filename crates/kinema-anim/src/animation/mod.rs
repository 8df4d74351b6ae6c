//! Chainable frame-animation tasks.
//!
//! An [`Animation`] is an ordered list of tasks plus a cursor. Sync tasks run
//! once and hand control back through their [`Continuation`]; async tasks are
//! driven by the chain's `FrameClock` with the elapsed time on every step
//! until they proceed.

mod chain;
mod steps;
mod task;

pub use chain::{Animation, AnimationState, Continuation, DEFAULT_STEP_INTERVAL};
