//! Kinema engine crate.
//!
//! This crate owns the platform pieces used by higher layers: the `FrameHost`
//! contract, an event loop that implements it, and the frame clock.

pub mod core;
pub mod event_loop;
pub mod time;

pub mod logging;
