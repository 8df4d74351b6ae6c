//! Time subsystem.
//!
//! `FrameClock` turns a host's frame requests into a start/stop/resume
//! timeline that reports elapsed time at a caller-chosen interval.
//! Intended usage:
//! - one `FrameClock` per animation track
//! - replace the frame callback with `set_on_frame` before each `start`

mod frame_clock;

pub use frame_clock::{ClockState, FrameClock, DEFAULT_FRAME_INTERVAL};
